use serde::Serialize;

/// Parameters of one Alpaca request; the variant picks the HTTP method.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum ActionParams<T> {
    Get(T),
    Put(T),
}

/// Build an ad-hoc form/query struct with Alpaca's PascalCase keys.
macro_rules! opaque_params {
    ($($key:ident: $value:expr),* $(,)?) => {{
        #[derive(Debug, serde::Serialize)]
        #[allow(non_snake_case)]
        struct Params {
            $($key: String,)*
        }

        Params {
            $($key: ::std::string::ToString::to_string(&$value),)*
        }
    }};
}
pub(crate) use opaque_params;
