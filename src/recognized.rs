/// A tag that was either decoded into a known variant `T`, or kept as the raw
/// on-disk value `Raw` because this crate has no typed meaning for it.
///
/// Archive entry kinds are the main user: a value outside the known set is
/// not corruption, it just has no typed representation, and the raw number
/// must survive so it can be reported or written back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Recognized<T, Raw = u32> {
    Known(T),
    Unknown(Raw),
}

impl<T: Copy, Raw: Copy> Copy for Recognized<T, Raw> {}

impl<T, Raw> Recognized<T, Raw> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Recognized::Known(t) => Some(t),
            Recognized::Unknown(_) => None,
        }
    }

    pub fn unknown(&self) -> Option<&Raw> {
        match self {
            Recognized::Known(_) => None,
            Recognized::Unknown(raw) => Some(raw),
        }
    }
}
