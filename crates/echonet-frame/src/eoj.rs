use std::fmt;

use serde::{Deserialize, Serialize};

/// Instance code addressing every instance of a class.
pub const ALL_INSTANCES: u8 = 0x00;

/// ECHONET object identifier: class group, class and instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Eoj {
    pub class_group: u8,
    pub class_code: u8,
    pub instance: u8,
}

impl Eoj {
    /// Wire size of an object identifier.
    pub const SIZE: usize = 3;

    /// Node profile object (`0x0EF001`).
    pub const NODE_PROFILE: Eoj = Eoj::new(0x0E, 0xF0, 0x01);

    /// Controller object (`0x05FF01`).
    pub const CONTROLLER: Eoj = Eoj::new(0x05, 0xFF, 0x01);

    pub const fn new(class_group: u8, class_code: u8, instance: u8) -> Self {
        Self {
            class_group,
            class_code,
            instance,
        }
    }

    /// Build from the packed 24-bit form, e.g. `0x0EF001`.
    pub const fn from_u32(value: u32) -> Self {
        Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    pub const fn to_u32(self) -> u32 {
        ((self.class_group as u32) << 16) | ((self.class_code as u32) << 8) | self.instance as u32
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [self.class_group, self.class_code, self.instance]
    }

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }

    /// The same class with the "all instances" instance code.
    pub const fn all_instances(self) -> Self {
        Self::new(self.class_group, self.class_code, ALL_INSTANCES)
    }

    pub const fn is_all_instances(self) -> bool {
        self.instance == ALL_INSTANCES
    }

    /// True when both identifiers name the same class, ignoring instance.
    pub const fn same_class(self, other: Eoj) -> bool {
        self.class_group == other.class_group && self.class_code == other.class_code
    }

    /// True when `self` is addressed by `target`: an exact match, or a
    /// wildcard target of the same class.
    pub const fn is_member_of(self, target: Eoj) -> bool {
        if target.is_all_instances() {
            self.same_class(target)
        } else {
            self.to_u32() == target.to_u32()
        }
    }

    pub const fn is_node_profile(self) -> bool {
        self.class_group == 0x0E && self.class_code == 0xF0
    }
}

impl fmt::Display for Eoj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}{:02X}{:02X}",
            self.class_group, self.class_code, self.instance
        )
    }
}

impl From<[u8; 3]> for Eoj {
    fn from(bytes: [u8; 3]) -> Self {
        Self::from_bytes(bytes)
    }
}
