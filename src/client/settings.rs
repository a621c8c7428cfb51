// src/client/settings.rs

use crate::core::account::Gecos;

/// The editable settings of one account, as submitted by a settings panel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings {
    pub shell: String,
    pub gecos: Gecos,
    pub groups: Vec<u32>,
    pub primary_group: u32,
}

impl Settings {
    /// Group ids converted for the wire. Ids above `i32::MAX` cannot be sent.
    pub(crate) fn wire_groups(&self) -> Option<(i32, Vec<i32>)> {
        let primary = i32::try_from(self.primary_group).ok()?;
        let groups = self
            .groups
            .iter()
            .map(|gid| i32::try_from(*gid).ok())
            .collect::<Option<Vec<_>>>()?;
        Some((primary, groups))
    }
}
