use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A per-field override slot.
///
/// `Inherit` means the branch takes the template's value; `Set` carries an
/// explicit value, which may itself be "falsy" (`false`, `0`, `None`). On the
/// wire an absent key is `Inherit` and a present key is `Set`, so container
/// fields must be annotated with
/// `#[serde(default, skip_serializing_if = "Patch::is_inherit")]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Inherit,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Inherit
    }
}

impl<T> Patch<T> {
    pub fn is_inherit(&self) -> bool {
        matches!(self, Patch::Inherit)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Inherit => Patch::Inherit,
            Patch::Set(v) => Patch::Set(v),
        }
    }

    pub fn as_mut(&mut self) -> Patch<&mut T> {
        match self {
            Patch::Inherit => Patch::Inherit,
            Patch::Set(v) => Patch::Set(v),
        }
    }

    /// The override value if set, else `base`.
    pub fn resolve_or(&self, base: &T) -> T
    where
        T: Clone,
    {
        match self {
            Patch::Inherit => base.clone(),
            Patch::Set(v) => v.clone(),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Inherit,
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Set(v) => v.serialize(serializer),
            Patch::Inherit => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Patch::Set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Slots {
        #[serde(default, skip_serializing_if = "Patch::is_inherit")]
        active: Patch<bool>,
        #[serde(default, skip_serializing_if = "Patch::is_inherit")]
        note: Patch<Option<String>>,
    }

    #[test]
    fn absent_key_is_inherit() {
        let slots: Slots = serde_json::from_str("{}").unwrap();
        assert_eq!(slots, Slots::default());
    }

    #[test]
    fn falsy_values_are_set_not_inherit() {
        let slots: Slots = serde_json::from_str(r#"{"active": false, "note": null}"#).unwrap();
        assert_eq!(slots.active, Patch::Set(false));
        assert_eq!(slots.note, Patch::Set(None));
    }

    #[test]
    fn inherit_is_omitted_when_serialized() {
        let slots = Slots {
            active: Patch::Set(true),
            note: Patch::Inherit,
        };
        assert_eq!(serde_json::to_string(&slots).unwrap(), r#"{"active":true}"#);
    }

    #[test]
    fn resolve_or_prefers_set_value() {
        assert_eq!(Patch::Set(3).resolve_or(&7), 3);
        assert_eq!(Patch::<i32>::Inherit.resolve_or(&7), 7);
    }
}
