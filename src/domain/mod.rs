pub mod recall_record;
pub mod subscriber_email;

pub use recall_record::{PublicationDate, RawRecallRecord, RecallRecord, UNKNOWN_PRODUCT};
pub use subscriber_email::SubscriberEmail;
