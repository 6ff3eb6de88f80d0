/// Closed enumeration of trace event kinds (spec.md §3). The wire
/// representation is the discriminant as a single byte — do not reorder
/// existing variants, only append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    RequestSpanStart = 1,
    RequestSpanEnd = 2,
    AuthSpanStart = 3,
    AuthSpanEnd = 4,
    PubsubMessageSpanStart = 5,
    PubsubMessageSpanEnd = 6,
    DBQueryStart = 7,
    DBQueryEnd = 8,
    DBTransactionStart = 9,
    DBTransactionEnd = 10,
    RPCCallStart = 11,
    RPCCallEnd = 12,
    HTTPCallStart = 13,
    HTTPCallEnd = 14,
    PubsubPublishStart = 15,
    PubsubPublishEnd = 16,
    ServiceInitStart = 17,
    ServiceInitEnd = 18,
    CacheCallStart = 19,
    CacheCallEnd = 20,
    LogMessage = 21,
    BodyStream = 22,
    CustomSpanStart = 23,
    CustomSpanEnd = 24,
    TestSpanStart = 25,
    TestSpanEnd = 26,
    GoStart = 27,
    GoEnd = 28,
}

impl EventType {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// The seven point operations that share one Start/End pairing shape
/// (spec.md §4.4: "Point/paired operations ... the **only** mechanism used
/// for linking point events").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointKind {
    DBQuery,
    DBTransaction,
    RPCCall,
    HTTPCall,
    PubsubPublish,
    ServiceInit,
    CacheCall,
}

impl PointKind {
    pub fn start_type(self) -> EventType {
        match self {
            PointKind::DBQuery => EventType::DBQueryStart,
            PointKind::DBTransaction => EventType::DBTransactionStart,
            PointKind::RPCCall => EventType::RPCCallStart,
            PointKind::HTTPCall => EventType::HTTPCallStart,
            PointKind::PubsubPublish => EventType::PubsubPublishStart,
            PointKind::ServiceInit => EventType::ServiceInitStart,
            PointKind::CacheCall => EventType::CacheCallStart,
        }
    }

    pub fn end_type(self) -> EventType {
        match self {
            PointKind::DBQuery => EventType::DBQueryEnd,
            PointKind::DBTransaction => EventType::DBTransactionEnd,
            PointKind::RPCCall => EventType::RPCCallEnd,
            PointKind::HTTPCall => EventType::HTTPCallEnd,
            PointKind::PubsubPublish => EventType::PubsubPublishEnd,
            PointKind::ServiceInit => EventType::ServiceInitEnd,
            PointKind::CacheCall => EventType::CacheCallEnd,
        }
    }
}
