use serenity::model::id::{ChannelId, GuildId, UserId};

/// Fuente de permisos de un usuario en la guild
#[cfg_attr(test, mockall::automock)]
pub trait PrivilegeSource: Send + Sync {
    fn has_manage_guild(&self, guild: GuildId, user: UserId) -> bool;
    fn role_names(&self, guild: GuildId, user: UserId) -> Vec<String>;
}

/// Usuario presente en un canal de voz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMember {
    pub id: UserId,
    pub bot: bool,
}

/// Lo que el bot puede hacer en un canal de voz antes de entrar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelAccess {
    pub can_connect: bool,
    pub can_speak: bool,
    pub can_move_members: bool,
    /// `None` o `Some(0)` significa sin límite
    pub user_limit: Option<u32>,
    pub occupants: usize,
}

impl ChannelAccess {
    pub fn is_full(&self) -> bool {
        match self.user_limit {
            Some(limit) if limit > 0 => self.occupants >= limit as usize && !self.can_move_members,
            _ => false,
        }
    }
}

/// Fuente de ocupación de canales de voz
#[cfg_attr(test, mockall::automock)]
pub trait MembershipSource: Send + Sync {
    /// Miembros del canal en el orden de la plataforma (arbitrario)
    fn members_of(&self, guild: GuildId, channel: ChannelId) -> Vec<ChannelMember>;
    fn channel_access(&self, guild: GuildId, channel: ChannelId) -> Option<ChannelAccess>;
    fn voice_channel_of(&self, guild: GuildId, user: UserId) -> Option<ChannelId>;
}

/// Cambio de canal de voz de un usuario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceMove {
    pub user: UserId,
    pub bot: bool,
    pub from: Option<ChannelId>,
    pub to: Option<ChannelId>,
}

impl VoiceMove {
    pub fn left(&self, channel: ChannelId) -> bool {
        self.from == Some(channel) && self.to != Some(channel)
    }

    pub fn joined(&self, channel: ChannelId) -> bool {
        self.to == Some(channel) && self.from != Some(channel)
    }
}

/// Un usuario es privilegiado si es el DJ, puede gestionar la guild o tiene
/// un rol llamado "DJ" (sin distinguir mayúsculas).
pub fn is_privileged(
    source: &dyn PrivilegeSource,
    guild: GuildId,
    dj: UserId,
    actor: UserId,
) -> bool {
    if actor == dj {
        return true;
    }

    source.has_manage_guild(guild, actor)
        || source
            .role_names(guild, actor)
            .iter()
            .any(|name| name.eq_ignore_ascii_case("dj"))
}

/// Decide si el DJ cambia tras un movimiento de voz en el canal de la sesión.
///
/// - Si el DJ sale, pasa al primer miembro humano que quede.
/// - Si alguien entra y el DJ ya no está, el recién llegado pasa a ser DJ.
pub fn next_dj(
    dj: UserId,
    change: &VoiceMove,
    channel: ChannelId,
    members: &[ChannelMember],
) -> Option<UserId> {
    if change.bot {
        return None;
    }

    if change.user == dj && change.left(channel) {
        return members
            .iter()
            .find(|member| !member.bot && member.id != dj)
            .map(|member| member.id);
    }

    let dj_present = members.iter().any(|member| member.id == dj);
    if change.joined(channel) && !dj_present {
        return Some(change.user);
    }

    None
}
