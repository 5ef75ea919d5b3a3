pub mod blacklist_entry;
pub mod click;
pub mod event;
pub mod offer;
pub mod postback_delivery;
pub mod postback_profile;
pub mod tracking_link;

pub use blacklist_entry::Entity as BlacklistEntryEntity;
pub use click::Entity as ClickEntity;
pub use event::Entity as EventEntity;
pub use offer::Entity as OfferEntity;
pub use postback_delivery::Entity as PostbackDeliveryEntity;
pub use postback_profile::Entity as PostbackProfileEntity;
pub use tracking_link::Entity as TrackingLinkEntity;
