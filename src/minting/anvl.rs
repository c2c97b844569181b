//! ANVL encoding of registration requests and decoding of EZID responses.

use crate::app::ports::{RegistrationFailure, RegistrationRequest};

pub fn encode(request: &RegistrationRequest) -> String {
    let mut lines = vec![
        element("_target", &request.target_url),
        element("_profile", "erc"),
        element("erc.who", &request.creator),
        element("erc.what", &request.title),
    ];
    if let Some(date) = &request.date {
        lines.push(element("erc.when", date));
    }
    if let Some(relation) = &request.relation {
        lines.push(element("dc.relation", relation));
    }
    lines.join("\n")
}

fn element(name: &str, value: &str) -> String {
    format!("{}: {}", escape(name, true), escape(value, false))
}

fn escape(text: &str, is_name: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '%' => out.push_str("%25"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            ':' if is_name => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    out
}

/// Interpret an EZID response. A `success:` body may carry a shadow
/// identifier after `|`, which is dropped.
pub fn parse_response(status: u16, body: &str) -> Result<String, RegistrationFailure> {
    let body = body.trim();
    if (200..300).contains(&status) {
        if let Some(rest) = body.strip_prefix("success:") {
            let identifier = rest.split('|').next().unwrap_or_default().trim();
            if identifier.is_empty() {
                return Err(RegistrationFailure::Definitive {
                    status: Some(status),
                    diagnostic: "success response without an identifier".into(),
                });
            }
            return Ok(identifier.to_string());
        }
    }

    let diagnostic = body
        .strip_prefix("error:")
        .map(str::trim)
        .unwrap_or(body)
        .to_string();
    if status >= 500 || status == 408 {
        return Err(RegistrationFailure::Transient(format!("HTTP {}: {}", status, diagnostic)));
    }
    Err(RegistrationFailure::Definitive {
        status: Some(status),
        diagnostic: if diagnostic.is_empty() {
            format!("unexpected response with status {}", status)
        } else {
            diagnostic
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegistrationRequest {
        RegistrationRequest {
            target_url: "https://digital.ucdavis.edu/item/mc-001".into(),
            title: "Family Album".into(),
            creator: "J. Doe".into(),
            date: Some("1937-1941".into()),
            relation: Some("ark:/87293/d3col".into()),
        }
    }

    #[test]
    fn test_encode_lists_erc_elements() {
        let body = encode(&request());
        assert_eq!(
            body,
            "_target: https://digital.ucdavis.edu/item/mc-001\n\
             _profile: erc\n\
             erc.who: J. Doe\n\
             erc.what: Family Album\n\
             erc.when: 1937-1941\n\
             dc.relation: ark:/87293/d3col"
        );
    }

    #[test]
    fn test_values_are_escaped() {
        let mut req = request();
        req.title = "100% line\nbreak".into();
        req.date = None;
        req.relation = None;
        let body = encode(&req);
        assert!(body.contains("erc.what: 100%25 line%0Abreak"));
        assert_eq!(body.lines().count(), 4);
    }

    #[test]
    fn test_parse_success() {
        assert_eq!(
            parse_response(201, "success: ark:/87293/d3xyz\n").unwrap(),
            "ark:/87293/d3xyz"
        );
        assert_eq!(
            parse_response(201, "success: ark:/87293/d3xyz | doi:10.1/abc").unwrap(),
            "ark:/87293/d3xyz"
        );
    }

    #[test]
    fn test_parse_classifies_failures() {
        assert!(matches!(
            parse_response(503, "error: service unavailable"),
            Err(RegistrationFailure::Transient(_))
        ));
        match parse_response(401, "error: unauthorized") {
            Err(RegistrationFailure::Definitive { status, diagnostic }) => {
                assert_eq!(status, Some(401));
                assert_eq!(diagnostic, "unauthorized");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_response(429, "error: too many requests"),
            Err(RegistrationFailure::Definitive { .. })
        ));
        assert!(matches!(
            parse_response(200, "error: bad request - no such shoulder"),
            Err(RegistrationFailure::Definitive { .. })
        ));
        assert!(matches!(
            parse_response(201, "success:   "),
            Err(RegistrationFailure::Definitive { .. })
        ));
    }
}
