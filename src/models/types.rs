/// Uuid-backed id newtypes. `#[postgres(transparent)]` lets tokio-postgres
/// bind them directly as `uuid` parameters; serde sees a plain UUID string.
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Copy,
            Clone,
            Debug,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            postgres_types::ToSql,
            postgres_types::FromSql,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[repr(transparent)]
        #[postgres(transparent)]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            #[inline]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
            #[inline]
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(v: uuid::Uuid) -> Self {
                Self(v)
            }
        }
        impl From<$name> for uuid::Uuid {
            fn from(v: $name) -> uuid::Uuid {
                v.0
            }
        }
    };
}

define_id!(AccountId);
define_id!(ItemId);
define_id!(TemplateId);
