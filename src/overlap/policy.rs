//! 重叠处理的操作系统策略表。
//! Operating system policy table for overlap handling.

use crate::{error::Error, segment::Segment};
use std::fmt;
use std::str::FromStr;

/// The TCP stack whose overlap behaviour a stream mimics.
///
/// 流所模仿的 TCP 协议栈的重叠处理行为。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OsPolicy {
    /// The oldest data always wins.
    First,
    #[default]
    Bsd,
    BsdRight,
    OldLinux,
    Linux,
    OldSolaris,
    Solaris,
    Hpux10,
    Hpux11,
    Irix,
    MacOs,
    Windows,
    Vista,
    Windows2k3,
    /// The most recently received data always wins.
    Last,
}

/// How a new segment lies relative to an existing one it overlaps.
///
/// 新分段相对于与其重叠的已有分段的位置关系。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlapKind {
    SameStartEndsWithin,
    SameStartSameEnd,
    SameStartEndsBeyond,
    StartsBeforeEndsWithin,
    StartsBeforeSameEnd,
    StartsBeforeEndsBeyond,
    StartsAfterEndsWithin,
    StartsAfterSameEnd,
    StartsAfterEndsBeyond,
}

impl OverlapKind {
    /// 对新分段与已有分段的位置关系分类
    /// Classify the position of a new segment against an existing one
    pub fn classify(new: &Segment, existing: &Segment) -> Self {
        use std::cmp::Ordering::*;
        use OverlapKind::*;

        match (new.offset.cmp(&existing.offset), new.end().cmp(&existing.end())) {
            (Equal, Less) => SameStartEndsWithin,
            (Equal, Equal) => SameStartSameEnd,
            (Equal, Greater) => SameStartEndsBeyond,
            (Less, Less) => StartsBeforeEndsWithin,
            (Less, Equal) => StartsBeforeSameEnd,
            (Less, Greater) => StartsBeforeEndsBeyond,
            (Greater, Less) => StartsAfterEndsWithin,
            (Greater, Equal) => StartsAfterSameEnd,
            (Greater, Greater) => StartsAfterEndsBeyond,
        }
    }
}

impl OsPolicy {
    pub const ALL: [OsPolicy; 15] = [
        OsPolicy::First,
        OsPolicy::Bsd,
        OsPolicy::BsdRight,
        OsPolicy::OldLinux,
        OsPolicy::Linux,
        OsPolicy::OldSolaris,
        OsPolicy::Solaris,
        OsPolicy::Hpux10,
        OsPolicy::Hpux11,
        OsPolicy::Irix,
        OsPolicy::MacOs,
        OsPolicy::Windows,
        OsPolicy::Vista,
        OsPolicy::Windows2k3,
        OsPolicy::Last,
    ];

    /// Whether the new segment's bytes win the overlapping range when they
    /// differ from the stored bytes.
    ///
    /// 当新旧字节不同时，新分段的字节是否在重叠区间胜出。
    pub fn prefers_new(self, kind: OverlapKind) -> bool {
        use OsPolicy::*;
        use OverlapKind::*;

        match (self, kind) {
            (Last, _) => true,
            (First | BsdRight | OldSolaris | Vista, _) => false,
            (OldLinux | Solaris | Hpux11, SameStartSameEnd) => true,
            (Linux | OldLinux | Solaris | Hpux11, SameStartEndsBeyond) => true,
            (
                Bsd | Hpux10 | Irix | Windows | Windows2k3 | OldLinux | Linux | MacOs,
                StartsBeforeEndsWithin | StartsBeforeSameEnd | StartsBeforeEndsBeyond,
            ) => true,
            (Solaris | Hpux11, StartsBeforeSameEnd | StartsBeforeEndsBeyond) => true,
            (Solaris | Hpux11, StartsAfterEndsBeyond) => true,
            _ => false,
        }
    }

    /// The configuration name of the policy.
    pub fn name(self) -> &'static str {
        match self {
            OsPolicy::First => "first",
            OsPolicy::Bsd => "bsd",
            OsPolicy::BsdRight => "bsd-right",
            OsPolicy::OldLinux => "old-linux",
            OsPolicy::Linux => "linux",
            OsPolicy::OldSolaris => "old-solaris",
            OsPolicy::Solaris => "solaris",
            OsPolicy::Hpux10 => "hpux10",
            OsPolicy::Hpux11 => "hpux11",
            OsPolicy::Irix => "irix",
            OsPolicy::MacOs => "macos",
            OsPolicy::Windows => "windows",
            OsPolicy::Vista => "vista",
            OsPolicy::Windows2k3 => "windows2k3",
            OsPolicy::Last => "last",
        }
    }
}

impl fmt::Display for OsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OsPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        OsPolicy::ALL
            .into_iter()
            .find(|policy| policy.name() == name)
            .ok_or(Error::UnknownPolicy { name })
    }
}
