// @generated
// This file is @generated by prost-build.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct DuelParams {
    #[prost(bool, tag = "1")]
    pub is_private: bool,
    #[prost(uint32, tag = "2")]
    pub max_players: u32,
    #[prost(uint32, tag = "3")]
    pub max_gifts: u32,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct DuelParticipant {
    #[prost(message, optional, tag = "1")]
    pub telegram_user_id: ::core::option::Option<super::super::shared::v1::TelegramUserId>,
    #[prost(string, tag = "2")]
    pub photo_url: ::prost::alloc::string::String,
    #[prost(bool, tag = "3")]
    pub is_creator: bool,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct StakedGift {
    #[prost(message, optional, tag = "1")]
    pub gift_id: ::core::option::Option<super::super::shared::v1::GiftId>,
    #[prost(string, tag = "2")]
    pub title: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub slug: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    pub price: ::core::option::Option<super::super::shared::v1::TonAmount>,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct DuelStake {
    #[prost(message, optional, tag = "1")]
    pub participant_telegram_user_id: ::core::option::Option<
        super::super::shared::v1::TelegramUserId,
    >,
    #[prost(message, optional, tag = "2")]
    pub gift: ::core::option::Option<StakedGift>,
    #[prost(message, optional, tag = "3")]
    pub stake_value: ::core::option::Option<super::super::shared::v1::TonAmount>,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct EntryPriceRange {
    #[prost(message, optional, tag = "1")]
    pub min_entry_price: ::core::option::Option<super::super::shared::v1::TonAmount>,
    #[prost(message, optional, tag = "2")]
    pub max_entry_price: ::core::option::Option<super::super::shared::v1::TonAmount>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DuelCreatedEvent {
    #[prost(message, optional, tag = "1")]
    pub duel_id: ::core::option::Option<super::super::shared::v1::DuelId>,
    #[prost(message, optional, tag = "2")]
    pub params: ::core::option::Option<DuelParams>,
    #[prost(message, optional, tag = "3")]
    pub created_at: ::core::option::Option<::prost_types::Timestamp>,
    #[prost(int64, tag = "4")]
    pub display_number: i64,
    #[prost(message, repeated, tag = "5")]
    pub participants: ::prost::alloc::vec::Vec<DuelParticipant>,
    #[prost(message, repeated, tag = "6")]
    pub stakes: ::prost::alloc::vec::Vec<DuelStake>,
    #[prost(enumeration = "DuelStatus", tag = "7")]
    pub status: i32,
    #[prost(message, optional, tag = "8")]
    pub entry_price_range: ::core::option::Option<EntryPriceRange>,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct DuelParticipantEvent {
    #[prost(message, optional, tag = "1")]
    pub duel_id: ::core::option::Option<super::super::shared::v1::DuelId>,
    #[prost(message, optional, tag = "2")]
    pub participant: ::core::option::Option<DuelParticipant>,
    #[prost(message, repeated, tag = "3")]
    pub stakes: ::prost::alloc::vec::Vec<DuelStake>,
    #[prost(message, optional, tag = "4")]
    pub total_stake_value: ::core::option::Option<super::super::shared::v1::TonAmount>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DuelCompletedEvent {
    #[prost(message, optional, tag = "1")]
    pub duel_id: ::core::option::Option<super::super::shared::v1::DuelId>,
    #[prost(message, optional, tag = "2")]
    pub winner_telegram_user_id: ::core::option::Option<
        super::super::shared::v1::TelegramUserId,
    >,
    #[prost(message, optional, tag = "3")]
    pub completed_at: ::core::option::Option<::prost_types::Timestamp>,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct DuelCancelledEvent {
    #[prost(message, optional, tag = "1")]
    pub duel_id: ::core::option::Option<super::super::shared::v1::DuelId>,
    #[prost(string, tag = "2")]
    pub reason: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DuelEvent {
    #[prost(oneof = "duel_event::Event", tags = "1, 2, 3, 4")]
    pub event: ::core::option::Option<duel_event::Event>,
}
/// Nested message and enum types in `DuelEvent`.
pub mod duel_event {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Event {
        #[prost(message, tag = "1")]
        DuelCreatedEvent(super::DuelCreatedEvent),
        #[prost(message, tag = "2")]
        DuelParticipantEvent(super::DuelParticipantEvent),
        #[prost(message, tag = "3")]
        DuelCompletedEvent(super::DuelCompletedEvent),
        #[prost(message, tag = "4")]
        DuelCancelledEvent(super::DuelCancelledEvent),
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DuelStatus {
    Unspecified = 0,
    WaitingForOpponent = 1,
    InProgress = 2,
    Completed = 3,
    Cancelled = 4,
}
impl DuelStatus {
    /// String value of the enum field names used in the ProtoBuf definition.
    ///
    /// The values are not transformed in any way and thus are considered stable
    /// (if the ProtoBuf definition does not change) and safe for programmatic use.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::Unspecified => "DUEL_STATUS_UNSPECIFIED",
            Self::WaitingForOpponent => "DUEL_STATUS_WAITING_FOR_OPPONENT",
            Self::InProgress => "DUEL_STATUS_IN_PROGRESS",
            Self::Completed => "DUEL_STATUS_COMPLETED",
            Self::Cancelled => "DUEL_STATUS_CANCELLED",
        }
    }
    /// Creates an enum from field names used in the ProtoBuf definition.
    pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
        match value {
            "DUEL_STATUS_UNSPECIFIED" => Some(Self::Unspecified),
            "DUEL_STATUS_WAITING_FOR_OPPONENT" => Some(Self::WaitingForOpponent),
            "DUEL_STATUS_IN_PROGRESS" => Some(Self::InProgress),
            "DUEL_STATUS_COMPLETED" => Some(Self::Completed),
            "DUEL_STATUS_CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}
// @@protoc_insertion_point(module)
