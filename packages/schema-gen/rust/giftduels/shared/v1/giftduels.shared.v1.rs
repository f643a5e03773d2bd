// @generated
// This file is @generated by prost-build.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct TelegramUserId {
    #[prost(int64, tag = "1")]
    pub value: i64,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct DuelId {
    #[prost(string, tag = "1")]
    pub value: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct GiftId {
    #[prost(string, tag = "1")]
    pub value: ::prost::alloc::string::String,
}
/// Decimal TON amount encoded as a string to avoid float rounding.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct TonAmount {
    #[prost(string, tag = "1")]
    pub value: ::prost::alloc::string::String,
}
// @@protoc_insertion_point(module)
