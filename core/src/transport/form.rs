//! Form body encoders.

use url::form_urlencoded;
use uuid::Uuid;

/// `application/x-www-form-urlencoded` rendering of `fields`.
pub fn urlencoded(fields: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish()
}

/// A fresh boundary that cannot collide with ordinary form values.
pub fn boundary() -> String {
    format!("------------------------{}", Uuid::new_v4().simple())
}

/// `multipart/form-data` body with one text part per field.
pub fn multipart(boundary: &str, fields: &[(String, String)]) -> Vec<u8> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str("--");
        body.push_str(boundary);
        body.push_str("\r\nContent-Disposition: form-data; name=\"");
        body.push_str(&name.replace('"', "%22"));
        body.push_str("\"\r\n\r\n");
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str("--");
    body.push_str(boundary);
    body.push_str("--\r\n");
    body.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn urlencoded_escapes_reserved_characters() {
        let body = urlencoded(&fields(&[("name", "Pneu 175/70"), ("qty", "2&3")]));
        assert_eq!(body, "name=Pneu+175%2F70&qty=2%263");
    }

    #[test]
    fn multipart_has_one_part_per_field_and_closing_delimiter() {
        let body = multipart("XYZ", &fields(&[("part", "A-1"), ("qty", "4")]));
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text,
            "--XYZ\r\nContent-Disposition: form-data; name=\"part\"\r\n\r\nA-1\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"qty\"\r\n\r\n4\r\n\
             --XYZ--\r\n"
        );
    }

    #[test]
    fn boundaries_are_unique() {
        assert_ne!(boundary(), boundary());
    }
}
