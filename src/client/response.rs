use super::ResponseWithTransaction;
use crate::{ASCOMError, ASCOMErrorCode, ASCOMResult};
use bytes::Bytes;
use mime::Mime;
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub(crate) trait Response: Sized {
    fn from_reqwest(mime_type: &Mime, bytes: &Bytes) -> eyre::Result<ResponseWithTransaction<Self>>;
}

#[derive(Deserialize)]
struct ValueResponse<T> {
    #[serde(rename = "Value")]
    value: T,
}

/// Successful response; for `()` the body is only checked for transaction IDs.
struct JsonResponse<T>(T);

impl<T: 'static + DeserializeOwned> Response for JsonResponse<T> {
    fn from_reqwest(mime_type: &Mime, bytes: &Bytes) -> eyre::Result<ResponseWithTransaction<Self>> {
        eyre::ensure!(
            mime_type.essence_str() == mime::APPLICATION_JSON.as_ref(),
            "Expected JSON response, got {mime_type}"
        );
        match mime_type.get_param(mime::CHARSET) {
            Some(mime::UTF_8) | None => {}
            Some(charset) => eyre::bail!("Unsupported charset {charset}"),
        }

        let value = if std::any::TypeId::of::<T>() == std::any::TypeId::of::<()>() {
            // void methods may echo anything in `Value`, or omit it
            serde_json::from_slice::<T>(b"null")?
        } else {
            serde_json::from_slice::<ValueResponse<T>>(bytes)?.value
        };

        Ok(ResponseWithTransaction {
            transaction: serde_json::from_slice(bytes)?,
            response: Self(value),
        })
    }
}

#[derive(Deserialize)]
struct ErrorFields {
    #[serde(rename = "ErrorNumber", default)]
    code: u16,
    #[serde(rename = "ErrorMessage", default)]
    message: String,
}

impl<T: 'static + DeserializeOwned> Response for ASCOMResult<T> {
    fn from_reqwest(mime_type: &Mime, bytes: &Bytes) -> eyre::Result<ResponseWithTransaction<Self>> {
        let error = serde_json::from_slice::<ErrorFields>(bytes)?;
        if error.code == ASCOMErrorCode::OK.raw() {
            Ok(JsonResponse::from_reqwest(mime_type, bytes)?.map(|JsonResponse(value)| Ok(value)))
        } else {
            Ok(ResponseWithTransaction {
                transaction: serde_json::from_slice(bytes)?,
                response: Err(ASCOMError::new(
                    ASCOMErrorCode::from_raw(error.code),
                    error.message,
                )),
            })
        }
    }
}
