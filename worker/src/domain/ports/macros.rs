//! `define_port_error!`: error enums for the worker's ports.
//!
//! Each variant gets a `#[error]` message, a snake-case constructor whose
//! parameters take `impl Into<T>`, and a static label used as the
//! `error_kind` field in logs.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@constructor $variant $( { $($field : $ty),* } )?);
            )*

            /// Snake-case name of the variant, for structured log fields.
            pub fn label(&self) -> &'static str {
                ::paste::paste! {
                    match self {
                        $(
                            Self::$variant { .. } => stringify!([<$variant:snake>]),
                        )*
                    }
                }
            }
        }
    };

    (@constructor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@constructor $variant:ident { $($field:ident : $ty:ty),* }) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($field: impl Into<$ty>),*) -> Self {
                Self::$variant { $($field: $field.into()),* }
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::domain::CommandKind;

    define_port_error! {
        pub enum SamplePortError {
            Closed => "channel closed",
            Broker { message: String } => "broker: {message}",
            BadPayload { kind: CommandKind, message: String } => "{kind}: {message}",
        }
    }

    #[rstest]
    #[case(SamplePortError::closed(), "channel closed", "closed")]
    #[case(SamplePortError::broker("connection reset"), "broker: connection reset", "broker")]
    #[case(
        SamplePortError::bad_payload(CommandKind::DeleteUser, "truncated"),
        "DeleteUser: truncated",
        "bad_payload"
    )]
    fn variants_render_and_label(
        #[case] err: SamplePortError,
        #[case] message: &str,
        #[case] label: &str,
    ) {
        assert_eq!(err.to_string(), message);
        assert_eq!(err.label(), label);
    }
}
