//! Outcome capability - responses that can report their own failure
//!
//! A chain inspects every dispatched response through [`Outcome::is_failure`].
//! A response that reports failure halts the chain and becomes the final value,
//! without an explicit `fail_when` guard.

/// Reports whether a response value represents a business failure
pub trait Outcome {
    /// Whether this value is a failure. Defaults to never failing.
    fn is_failure(&self) -> bool {
        false
    }
}

impl<T, E> Outcome for Result<T, E> {
    fn is_failure(&self) -> bool {
        self.is_err()
    }
}

macro_rules! never_fails {
    ($($ty:ty),* $(,)?) => {
        $(impl Outcome for $ty {})*
    };
}

never_fails!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
    &'static str,
);

impl<T> Outcome for Option<T> {}

impl<T> Outcome for Vec<T> {}

impl<T: Outcome + ?Sized> Outcome for Box<T> {
    fn is_failure(&self) -> bool {
        (**self).is_failure()
    }
}

macro_rules! tuple_never_fails {
    ($(($($name:ident),+)),* $(,)?) => {
        $(impl<$($name),+> Outcome for ($($name,)+) {})*
    };
}

tuple_never_fails!(
    (A),
    (A, B),
    (A, B, C),
    (A, B, C, D),
    (A, B, C, D, E),
    (A, B, C, D, E, F),
);
