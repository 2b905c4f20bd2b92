pub mod embeds;
pub mod replies;
