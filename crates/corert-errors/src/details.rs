use serde_json::Value;

/// Object-safe view of a polymorphic `Details` payload attached to a
/// structured [`crate::Error`]. Produced automatically for any type
/// implementing [`DetailType`]; callers never implement this trait by hand.
pub trait Detail: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn to_json(&self) -> Value;
    fn clone_box(&self) -> Box<dyn Detail>;
}

impl std::fmt::Debug for dyn Detail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(self.type_name()).field("value", &self.to_json()).finish()
    }
}

/// A concrete details type: a stable, globally unique `TYPE_NAME` used to
/// tag the value on the wire, plus whatever `serde` needs to decode it back.
/// Implement this (not [`Detail`] directly) and call [`register_detail`]
/// once per process so [`crate::round_trip`] can reconstruct it by name on
/// the receiving side.
pub trait DetailType: std::fmt::Debug + Clone + Send + Sync + serde::Serialize + serde::de::DeserializeOwned + 'static {
    const TYPE_NAME: &'static str;
}

impl<T: DetailType> Detail for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn clone_box(&self) -> Box<dyn Detail> {
        Box::new(self.clone())
    }
}

pub(crate) struct DetailRegistration {
    pub from_json: fn(&Value) -> Option<Box<dyn Detail>>,
}

/// Registers a decoder for `T` so [`crate::round_trip`] can reconstruct it
/// by type name on the receiving side. Call once per process — typically
/// from the module that defines `T` — the same role a `typetag`-style
/// registry plays elsewhere, hand-rolled here to keep the dependency list
/// aligned with the rest of the workspace.
pub fn register_detail<T: DetailType>() {
    crate::registry_insert(
        T::TYPE_NAME,
        DetailRegistration {
            from_json: |value| {
                serde_json::from_value::<T>(value.clone())
                    .ok()
                    .map(|v| Box::new(v) as Box<dyn Detail>)
            },
        },
    );
}
