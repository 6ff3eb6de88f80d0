use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An explicit presence-tracking wrapper around `T`.
///
/// Unlike a bare `T` with some sentinel value, `Opt<T>` can never be
/// confused for "the zero value was set on purpose" vs. "nothing was set".
/// Its JSON form is the bare value when present and `null` when absent, so
/// it round-trips through the same wire shape a plain nullable field would
/// use on the other side of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opt<T> {
    Some(T),
    None,
}

impl<T> Opt<T> {
    pub fn is_some(&self) -> bool {
        matches!(self, Opt::Some(_))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Opt::None)
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Opt::Some(v) => Some(v),
            Opt::None => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Opt::Some(v) => Some(v),
            Opt::None => None,
        }
    }

    pub fn get_or_else(self, default: impl FnOnce() -> T) -> T {
        match self {
            Opt::Some(v) => v,
            Opt::None => default(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Opt<U> {
        match self {
            Opt::Some(v) => Opt::Some(f(v)),
            Opt::None => Opt::None,
        }
    }
}

impl<T: PartialEq> Opt<T> {
    pub fn equal(&self, other: &Opt<T>) -> bool {
        self == other
    }
}

impl<T> Default for Opt<T> {
    fn default() -> Self {
        Opt::None
    }
}

impl<T> From<Option<T>> for Opt<T> {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => Opt::Some(v),
            None => Opt::None,
        }
    }
}

impl<T: Serialize> Serialize for Opt<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Opt::Some(v) => v.serialize(serializer),
            Opt::None => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Opt<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn some_round_trips_as_bare_value() {
        let v: Opt<u32> = Opt::Some(7);
        assert_eq!(serde_json::to_string(&v).unwrap(), "7");
        let back: Opt<u32> = serde_json::from_str("7").unwrap();
        assert_eq!(back, Opt::Some(7));
    }

    #[test]
    fn none_round_trips_as_null() {
        let v: Opt<u32> = Opt::None;
        assert_eq!(serde_json::to_string(&v).unwrap(), "null");
        let back: Opt<u32> = serde_json::from_str("null").unwrap();
        assert_eq!(back, Opt::None);
    }

    #[test]
    fn predicates_and_combinators() {
        let v: Opt<u32> = Opt::Some(3);
        assert!(v.is_some());
        assert!(!v.is_none());
        assert_eq!(v.get(), Some(&3));
        assert_eq!(v.map(|x| x + 1), Opt::Some(4));
        assert_eq!(Opt::<u32>::None.get_or_else(|| 9), 9);
        assert!(Opt::Some(1).equal(&Opt::Some(1)));
    }
}
