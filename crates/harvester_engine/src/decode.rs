use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use harvester_core::FetchError;

use crate::http::FetchedBody;

/// Decode an HTML body into UTF-8 using: BOM -> Content-Type charset ->
/// chardetng fallback. Undecodable input is a malformed response.
pub fn decode_html(body: &FetchedBody) -> Result<String, FetchError> {
    let bytes = body.bytes.as_slice();
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = body.content_type.as_deref().and_then(charset_label) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, enc);
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim_matches([' ', '"', '\''].as_ref()).to_string())
        })
        .next()
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<String, FetchError> {
    let (text, _, had_errors) = enc.decode(bytes);
    if had_errors {
        return Err(FetchError::malformed(format!(
            "body is not valid {}",
            enc.name()
        )));
    }
    Ok(text.into_owned())
}
