//! Cache key naming.
//!
//! Every logical entry is addressed by a [`KeyKind`] plus an identifier. The
//! rendered key is the kind's fixed prefix followed by the identifier, and
//! other processes sharing the same store must render it identically.

use crate::error::{CacheError, Result};

use std::fmt;
use std::str::FromStr;

macro_rules! key_kinds {
  ($( $(#[$doc:meta])* $variant:ident => $prefix:literal, $case:ident; )+) => {
    /// A logical kind of cached entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum KeyKind {
      $( $(#[$doc])* $variant, )+
    }

    impl KeyKind {
      /// Every kind, in declaration order.
      pub const ALL: &'static [KeyKind] = &[$( KeyKind::$variant, )+];

      /// The fixed prefix every key of this kind starts with.
      pub const fn prefix(self) -> &'static str {
        match self {
          $( KeyKind::$variant => $prefix, )+
        }
      }

      /// Whether string identifiers for this kind are lowercased.
      pub const fn case_insensitive(self) -> bool {
        match self {
          $( KeyKind::$variant => key_kinds!(@case $case), )+
        }
      }

      /// The tag used for this kind in mixed-kind batch requests.
      pub const fn tag(self) -> &'static str {
        match self {
          $( KeyKind::$variant => stringify!($variant), )+
        }
      }
    }
  };
  (@case exact) => { false };
  (@case lower) => { true };
}

key_kinds! {
  /// A person DTO by person id.
  PersonById => "Per:", exact;
  /// A person id by account name.
  PersonByAccountId => "PerAcct:", lower;
  /// Follower person ids of a person.
  FollowersByPerson => "Fwr:", exact;
  /// Follower person ids of a group.
  FollowersByGroup => "GFwr:", exact;
  /// Person ids a person follows.
  PeopleFollowedByPerson => "PFwd:", exact;
  /// Group ids a person follows.
  GroupsFollowedByPerson => "GFwd:", exact;
  /// An activity DTO by activity id.
  ActivityById => "Act:", exact;
  /// Security attributes of an activity.
  ActivitySecurityById => "ActSec:", exact;
  /// Activity ids of the composite stream of people a person follows.
  ActivitiesByFollowing => "CmpFwg:", exact;
  /// Activity ids of a composite stream.
  ActivitiesByCompositeStream => "CmpStr:", exact;
  /// Activity ids posted before fan-out to the following streams.
  BufferedActivities => "BufAct", exact;
  /// Every activity id in the system, newest first.
  EveryoneActivityIds => "EvAct", exact;
  /// Activity ids a person starred.
  StarredByPerson => "Star:", exact;
  /// Person ids who liked an activity.
  LikersByActivity => "Lkr:", exact;
  /// Activity ids a person liked.
  LikedByPerson => "Lkd:", exact;
  /// A comment DTO by comment id.
  CommentById => "Cmt:", exact;
  /// Comment ids under an activity.
  CommentIdsByActivity => "CmtAct:", exact;
  /// A stream view by id.
  StreamById => "Str:", exact;
  /// A composite stream by id.
  CompositeStreamById => "CmpS:", exact;
  /// Composite stream ids visible to a person.
  CompositeStreamIdsByPerson => "CmpSPer:", exact;
  /// The entity stream owned by a scope.
  EntityStreamByScope => "EStr:", exact;
  /// A group DTO by group id.
  GroupById => "Grp:", exact;
  /// A group id by short name.
  GroupByShortName => "GrpSn:", lower;
  /// Coordinator person ids of a group.
  CoordinatorsByGroup => "GrpCrd:", exact;
  /// Private group ids a person coordinates.
  PrivateGroupsCoordinatedByPerson => "PrvGrpCrd:", exact;
  /// An organization DTO by id.
  OrganizationById => "Org:", exact;
  /// An organization id by short name.
  OrganizationByShortName => "OrgSn:", lower;
  /// Direct child organization ids.
  OrganizationDirectChildren => "OrgKid:", exact;
  /// All descendant organization ids.
  OrganizationRecursiveChildren => "OrgDsc:", exact;
  /// All ancestor organization ids.
  OrganizationParentsRecursive => "OrgAnc:", exact;
  /// Leader person ids of an organization.
  OrganizationLeaders => "OrgLdr:", exact;
  /// The organization tree rooted at an id.
  OrganizationTree => "OrgTree:", exact;
  /// A shared resource by its unique key.
  SharedResourceByUniqueKey => "ShRes:", lower;
}

impl fmt::Display for KeyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

impl FromStr for KeyKind {
  type Err = CacheError;

  fn from_str(tag: &str) -> Result<Self> {
    KeyKind::ALL
      .iter()
      .copied()
      .find(|kind| kind.tag() == tag)
      .ok_or_else(|| CacheError::UnknownKind(tag.to_string()))
  }
}

impl KeyKind {
  /// Parses a kind tag; an unknown tag is a programming error.
  pub fn from_tag(tag: &str) -> Result<Self> {
    tag.parse()
  }

  /// Renders the key for `suffix` under this kind.
  pub fn key<S: KeySuffix + ?Sized>(self, suffix: &S) -> String {
    let rendered = suffix.render();
    let mut key = String::with_capacity(self.prefix().len() + rendered.len());
    key.push_str(self.prefix());
    if self.case_insensitive() {
      key.push_str(&rendered.to_lowercase());
    } else {
      key.push_str(&rendered);
    }
    key
  }

  /// The single key used by global kinds such as the activity buffer.
  pub fn global_key(self) -> String {
    self.prefix().to_string()
  }
}

/// Something that renders to a stable key suffix.
///
/// The rendering must depend only on the value, never on identity.
pub trait KeySuffix {
  fn render(&self) -> String;
}

macro_rules! integer_suffix {
  ($($t:ty),+) => {
    $(
      impl KeySuffix for $t {
        fn render(&self) -> String {
          self.to_string()
        }
      }
    )+
  };
}

integer_suffix!(i32, i64, u32, u64, usize);

impl KeySuffix for str {
  fn render(&self) -> String {
    self.to_string()
  }
}

impl KeySuffix for String {
  fn render(&self) -> String {
    self.clone()
  }
}

impl<T: KeySuffix + ?Sized> KeySuffix for &T {
  fn render(&self) -> String {
    (**self).render()
  }
}

/// A logical key before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub kind: KeyKind,
  pub suffix: String,
}

impl CacheKey {
  pub fn new<S: KeySuffix + ?Sized>(kind: KeyKind, suffix: &S) -> Self {
    Self {
      kind,
      suffix: suffix.render(),
    }
  }

  pub fn render(&self) -> String {
    self.kind.key(&self.suffix)
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.render())
  }
}
