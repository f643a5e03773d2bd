// @generated
// This file is @generated by prost-build.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct StreamRequest {}
/// A response without payload is a keepalive heartbeat.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamResponse {
    #[prost(oneof = "stream_response::Payload", tags = "1")]
    pub payload: ::core::option::Option<stream_response::Payload>,
}
/// Nested message and enum types in `StreamResponse`.
pub mod stream_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        DuelEvent(super::super::super::duel::v1::DuelEvent),
    }
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct SubscribeDuelsRequest {
    #[prost(message, repeated, tag = "1")]
    pub duel_ids: ::prost::alloc::vec::Vec<super::super::shared::v1::DuelId>,
}
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct SubscribeDuelsResponse {}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct UnsubscribeDuelsRequest {
    #[prost(message, repeated, tag = "1")]
    pub duel_ids: ::prost::alloc::vec::Vec<super::super::shared::v1::DuelId>,
}
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct UnsubscribeDuelsResponse {}
// @@protoc_insertion_point(module)
