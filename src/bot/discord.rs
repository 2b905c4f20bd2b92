//! Adaptadores de la caché y la API de Discord hacia las sesiones

use async_trait::async_trait;
use serenity::{
    builder::CreateMessage,
    cache::Cache,
    http::Http,
    model::{
        guild::Guild,
        id::{ChannelId, GuildId, UserId},
        permissions::Permissions,
    },
};
use std::sync::Arc;
use tracing::warn;

use crate::audio::backend::{Notice, Notifier};
use crate::audio::policy::{ChannelAccess, ChannelMember, MembershipSource, PrivilegeSource};
use crate::ui::embeds;

/// Permisos y ocupación de voz leídos de la caché de serenity
pub struct CacheDirectory {
    cache: Arc<Cache>,
    bot_id: UserId,
}

impl CacheDirectory {
    pub fn new(cache: Arc<Cache>, bot_id: UserId) -> Self {
        Self { cache, bot_id }
    }

    fn is_bot(guild: &Guild, user: UserId) -> bool {
        guild
            .members
            .get(&user)
            .map(|member| member.user.bot)
            .or_else(|| {
                guild
                    .voice_states
                    .get(&user)
                    .and_then(|state| state.member.as_ref())
                    .map(|member| member.user.bot)
            })
            .unwrap_or(false)
    }
}

/// Permisos de rol que cuentan como "gestionar servidor"
fn grants_manage_guild(mut role_permissions: impl Iterator<Item = Permissions>) -> bool {
    role_permissions.any(|permissions| {
        permissions.administrator() || permissions.contains(Permissions::MANAGE_GUILD)
    })
}

impl PrivilegeSource for CacheDirectory {
    fn has_manage_guild(&self, guild: GuildId, user: UserId) -> bool {
        let Some(guild) = self.cache.guild(guild) else {
            return false;
        };
        if guild.owner_id == user {
            return true;
        }
        let Some(member) = guild.members.get(&user) else {
            return false;
        };

        let everyone = guild.id.everyone_role();
        let role_permissions = member
            .roles
            .iter()
            .chain(std::iter::once(&everyone))
            .filter_map(|role| guild.roles.get(role))
            .map(|role| role.permissions);

        grants_manage_guild(role_permissions)
    }

    fn role_names(&self, guild: GuildId, user: UserId) -> Vec<String> {
        let Some(guild) = self.cache.guild(guild) else {
            return Vec::new();
        };
        let Some(member) = guild.members.get(&user) else {
            return Vec::new();
        };

        member
            .roles
            .iter()
            .filter_map(|role| guild.roles.get(role))
            .map(|role| role.name.clone())
            .collect()
    }
}

impl MembershipSource for CacheDirectory {
    fn members_of(&self, guild: GuildId, channel: ChannelId) -> Vec<ChannelMember> {
        let Some(guild) = self.cache.guild(guild) else {
            return Vec::new();
        };

        guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel))
            .map(|state| ChannelMember {
                id: state.user_id,
                bot: Self::is_bot(&guild, state.user_id),
            })
            .collect()
    }

    fn channel_access(&self, guild: GuildId, channel: ChannelId) -> Option<ChannelAccess> {
        let guild = self.cache.guild(guild)?;
        let voice_channel = guild.channels.get(&channel)?;
        let me = guild.members.get(&self.bot_id)?;
        let permissions = guild.user_permissions_in(voice_channel, me);

        let occupants = guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel))
            .count();

        Some(ChannelAccess {
            can_connect: permissions.connect(),
            can_speak: permissions.speak(),
            can_move_members: permissions.move_members(),
            user_limit: voice_channel.user_limit,
            occupants,
        })
    }

    fn voice_channel_of(&self, guild: GuildId, user: UserId) -> Option<ChannelId> {
        self.cache
            .guild(guild)?
            .voice_states
            .get(&user)
            .and_then(|state| state.channel_id)
    }
}

/// Publica los avisos de las sesiones como embeds
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, channel: ChannelId, notice: Notice) {
        let message = CreateMessage::new().embed(embeds::create_notice_embed(&notice));
        if let Err(e) = channel.send_message(&self.http, message).await {
            warn!("⚠️ No se pudo publicar aviso en {}: {}", channel, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manage_guild_comes_from_any_role() {
        let roles = [Permissions::SEND_MESSAGES, Permissions::MANAGE_GUILD];
        assert!(grants_manage_guild(roles.into_iter()));
    }

    #[test]
    fn administrator_implies_manage_guild() {
        assert!(grants_manage_guild(std::iter::once(Permissions::ADMINISTRATOR)));
    }

    #[test]
    fn ordinary_roles_do_not_manage() {
        let roles = [Permissions::CONNECT | Permissions::SPEAK, Permissions::empty()];
        assert!(!grants_manage_guild(roles.into_iter()));
        assert!(!grants_manage_guild(std::iter::empty()));
    }
}
