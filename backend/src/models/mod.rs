//! Records persisted by the store, plus the request/response shapes that
//! travel with them.

/// Declares a string-backed enum stored in a `Text` column and exchanged as
/// a JSON string.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            serde::Serialize,
            serde::Deserialize,
            diesel::expression::AsExpression,
            diesel::deserialize::FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {} value {:?}", stringify!($name), other)),
                }
            }
        }

        impl diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg> for $name {
            fn to_sql<'b>(
                &'b self,
                out: &mut diesel::serialize::Output<'b, '_, diesel::pg::Pg>,
            ) -> diesel::serialize::Result {
                <str as diesel::serialize::ToSql<diesel::sql_types::Text, diesel::pg::Pg>>::to_sql(
                    self.as_str(),
                    out,
                )
            }
        }

        impl diesel::deserialize::FromSql<diesel::sql_types::Text, diesel::pg::Pg> for $name {
            fn from_sql(bytes: diesel::pg::PgValue<'_>) -> diesel::deserialize::Result<Self> {
                let text = <String as diesel::deserialize::FromSql<
                    diesel::sql_types::Text,
                    diesel::pg::Pg,
                >>::from_sql(bytes)?;
                text.parse::<$name>().map_err(Into::into)
            }
        }
    };
}

pub mod application;
pub mod inquiry;
pub mod message;
pub mod notification;
pub mod property;
pub mod review;
pub mod user;
pub mod verification;

pub use application::{Application, ApplicationStatus};
pub use inquiry::{Inquiry, InquiryStatus};
pub use message::{Conversation, Message};
pub use notification::{Notification, NotificationKind};
pub use property::{
    BasicInfo, Details, ListingType, Location, Media, Performance, Pricing, Property,
    PropertyInput, PropertyStatus, PropertyView,
};
pub use review::{RatingSummary, Review};
pub use user::{AuthProvider, PublicProfile, PublicUser, Role, User, LOCKOUT_MINUTES};
pub use verification::{mask_email, CodeCheck, EmailVerification, VerificationPurpose};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enums_round_trip_through_strings() {
        assert_eq!("approved".parse::<PropertyStatus>(), Ok(PropertyStatus::Approved));
        assert_eq!(PropertyStatus::Pending.to_string(), "pending");
        assert!("archived".parse::<PropertyStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&VerificationPurpose::EmailChange).unwrap(),
            "\"email_change\""
        );
    }
}
