//! Value types shared by the host side, the mirror and the native bridge.

use std::fmt;
use std::sync::Arc;

/// Identity of a top-level application window, chosen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// Identity of a node in the host's menu tree. The mirror only keeps these
/// as weak back-references and hands them back to the host to re-query it;
/// the host may have dropped the node in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNodeId(pub u64);

/// Identity of the action behind a host menu item. Used to recognise the
/// same item across syncs when it has no usable label (icon-only items).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(pub u64);

/// Kind of a mirrored menu item. The native item is created with a fixed
/// kind, so a host item that changes kind is mirrored by a new node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Action,
    Submenu,
    Separator,
    CheckableAction,
    RadioAction,
}

impl ItemKind {
    pub fn is_separator(self) -> bool {
        matches!(self, ItemKind::Separator)
    }

    /// Kinds carrying a checked state.
    pub fn is_checkable(self) -> bool {
        matches!(self, ItemKind::CheckableAction | ItemKind::RadioAction)
    }

    /// Kinds whose click invokes a host action.
    pub fn is_invokable(self) -> bool {
        matches!(
            self,
            ItemKind::Action | ItemKind::CheckableAction | ItemKind::RadioAction
        )
    }
}

/// Set of active modifiers for a shortcut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyModifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub super_key: bool,
}

impl KeyModifiers {
    pub const SHIFT_MASK: u32 = 1 << 0;
    pub const CTRL_MASK: u32 = 1 << 2;
    pub const ALT_MASK: u32 = 1 << 3;
    pub const SUPER_MASK: u32 = 1 << 6;

    /// X11-style modifier mask (Shift, Control, Mod1, Mod4) as expected by
    /// the native menu service.
    pub fn to_mask(self) -> u32 {
        let mut mask = 0;
        if self.shift {
            mask |= Self::SHIFT_MASK;
        }
        if self.ctrl {
            mask |= Self::CTRL_MASK;
        }
        if self.alt {
            mask |= Self::ALT_MASK;
        }
        if self.super_key {
            mask |= Self::SUPER_MASK;
        }
        mask
    }
}

/// A keyboard shortcut already translated by the host into the platform's
/// key code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shortcut {
    pub modifiers: KeyModifiers,
    pub key_code: u32,
}

/// Presentation state of a menu item, as last read from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub label: Option<String>,
    pub mnemonic: Option<char>,
    pub enabled: bool,
    pub checked: bool,
    /// Rasterised icon bytes; shared so snapshots stay cheap to clone.
    pub icon: Option<Arc<[u8]>>,
    pub shortcut: Option<Shortcut>,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            label: None,
            mnemonic: None,
            enabled: true,
            checked: false,
            icon: None,
            shortcut: None,
        }
    }
}

impl Presentation {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// The label if it can identify an item, i.e. it is present and not blank.
    pub fn match_label(&self) -> Option<&str> {
        self.label.as_deref().filter(|l| !l.trim().is_empty())
    }

    /// Label as sent to the native service, with the mnemonic marked by a
    /// leading underscore and literal underscores doubled.
    pub fn native_label(&self) -> String {
        let label = self.label.as_deref().unwrap_or("");
        let mut out = String::with_capacity(label.len() + 1);
        let mut marked = self.mnemonic.is_none();
        for c in label.chars() {
            if c == '_' {
                out.push_str("__");
                continue;
            }
            if !marked
                && let Some(m) = self.mnemonic
                && c.to_lowercase().eq(m.to_lowercase())
            {
                out.push('_');
                marked = true;
            }
            out.push(c);
        }
        out
    }

    fn icon_eq(a: &Option<Arc<[u8]>>, b: &Option<Arc<[u8]>>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a[..] == b[..],
            _ => false,
        }
    }

    /// Field-wise comparison; icons compare by content.
    pub fn same_as(&self, other: &Presentation) -> bool {
        self.label == other.label
            && self.mnemonic == other.mnemonic
            && self.enabled == other.enabled
            && self.checked == other.checked
            && self.shortcut == other.shortcut
            && Self::icon_eq(&self.icon, &other.icon)
    }

    pub(crate) fn icon_differs(&self, other: &Presentation) -> bool {
        !Self::icon_eq(&self.icon, &other.icon)
    }
}

/// Interaction events emitted by the native menu service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Opened,
    Closed,
    Clicked,
    AboutToShow,
    Activated,
    Shown,
    ChildAdded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_label_marks_mnemonic() {
        let p = Presentation {
            mnemonic: Some('f'),
            ..Presentation::labeled("File")
        };
        assert_eq!(p.native_label(), "_File");

        let p = Presentation {
            mnemonic: Some('a'),
            ..Presentation::labeled("Save As")
        };
        assert_eq!(p.native_label(), "S_ave As");
    }

    #[test]
    fn test_native_label_escapes_underscores() {
        let p = Presentation::labeled("snake_case");
        assert_eq!(p.native_label(), "snake__case");

        let p = Presentation {
            mnemonic: Some('c'),
            ..Presentation::labeled("snake_case")
        };
        assert_eq!(p.native_label(), "snake___case");
    }

    #[test]
    fn test_native_label_missing_mnemonic_char() {
        let p = Presentation {
            mnemonic: Some('z'),
            ..Presentation::labeled("Edit")
        };
        assert_eq!(p.native_label(), "Edit");
    }

    #[test]
    fn test_match_label_ignores_blank() {
        assert_eq!(Presentation::labeled("  ").match_label(), None);
        assert_eq!(Presentation::default().match_label(), None);
        assert_eq!(Presentation::labeled("Open").match_label(), Some("Open"));
    }

    #[test]
    fn test_same_as_compares_icon_content() {
        let a = Presentation {
            icon: Some(Arc::from(vec![1u8, 2, 3])),
            ..Presentation::labeled("Run")
        };
        let b = Presentation {
            icon: Some(Arc::from(vec![1u8, 2, 3])),
            ..Presentation::labeled("Run")
        };
        assert!(a.same_as(&b));

        let c = Presentation {
            icon: Some(Arc::from(vec![9u8])),
            ..Presentation::labeled("Run")
        };
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_modifier_mask() {
        let m = KeyModifiers {
            ctrl: true,
            shift: true,
            ..KeyModifiers::default()
        };
        assert_eq!(m.to_mask(), KeyModifiers::CTRL_MASK | KeyModifiers::SHIFT_MASK);
        assert_eq!(KeyModifiers::default().to_mask(), 0);
    }
}
