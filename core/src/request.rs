//! Turns a URL, a method and resolved options into a request head plus a
//! pending body.
//!
//! Nothing here touches the network, and the multipart producer is not
//! started yet: the pre-request hook gets to run (and possibly refuse the
//! call) before any body bytes are produced.

use std::collections::BTreeMap;

use ureq::http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use ureq::http::Request;
use url::Url;

use crate::error::Error;
use crate::http::HttpMethod;
use crate::multipart;
use crate::options::{Body, Destination, Form, Payload, RequestOptions};

/// Body attached to a prepared request, not yet streaming.
#[derive(Debug)]
pub(crate) enum PendingBody {
    Stream(Body),
    Form { form: Form, boundary: String },
}

/// A request ready for the hook and the transport.
#[derive(Debug)]
pub(crate) struct Prepared<'a> {
    pub(crate) head: Request<()>,
    pub(crate) body: Option<PendingBody>,
    pub(crate) destination: Option<Destination<'a>>,
}

pub(crate) fn prepare<'a>(
    url: &str,
    method: &HttpMethod,
    options: RequestOptions<'a>,
    user_agent: Option<&str>,
) -> Result<Prepared<'a>, Error> {
    let RequestOptions {
        accept,
        query,
        payload,
        destination,
    } = options;

    let url = build_url(url, query.as_ref())?;
    let method = method.to_method().map_err(ureq::http::Error::from)?;

    let mut builder = Request::builder().method(method).uri(url.as_str());
    if let Some(agent) = user_agent {
        builder = builder.header(USER_AGENT, agent);
    }
    if !accept.is_empty() {
        builder = builder.header(ACCEPT, accept.as_str());
    }

    let body = match payload {
        None => None,
        Some(Payload::Body(body)) => {
            if !body.content_type.is_empty() {
                builder = builder.header(CONTENT_TYPE, body.content_type.as_str());
            }
            if let Some(length) = body.length {
                builder = builder.header(CONTENT_LENGTH, length);
            }
            Some(PendingBody::Stream(body))
        }
        Some(Payload::Form(form)) => {
            let boundary = multipart::boundary();
            builder = builder.header(CONTENT_TYPE, multipart::content_type(&boundary));
            Some(PendingBody::Form { form, boundary })
        }
    };

    Ok(Prepared {
        head: builder.body(())?,
        body,
        destination,
    })
}

/// Parse `raw` and append `query` to whatever query string it already has.
pub fn build_url(raw: &str, query: Option<&BTreeMap<String, String>>) -> Result<Url, Error> {
    let mut url = Url::parse(raw).map_err(|source| Error::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{JSON_CONTENT_TYPE, XML_CONTENT_TYPE};

    fn pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn query_is_appended_to_an_existing_query() {
        let query: BTreeMap<String, String> = [("page", "2"), ("q", "a b&c")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let url = build_url("http://host/items?sort=asc", Some(&query)).unwrap();
        assert_eq!(
            pairs(&url),
            vec![
                ("sort".to_string(), "asc".to_string()),
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "a b&c".to_string()),
            ]
        );
        assert_eq!(url.query(), Some("sort=asc&page=2&q=a+b%26c"));
    }

    #[test]
    fn empty_query_leaves_the_url_alone() {
        let url = build_url("http://host/items", Some(&BTreeMap::new())).unwrap();
        assert_eq!(url.as_str(), "http://host/items");
    }

    #[test]
    fn malformed_url_is_rejected() {
        let err = build_url("not a url", None).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn head_carries_accept_and_body_headers() {
        let opts = RequestOptions::new()
            .accept(XML_CONTENT_TYPE)
            .body(Body::json(&serde_json::json!({"a": 1})).unwrap());
        let prepared =
            prepare("http://host/x", &HttpMethod::Post, opts, Some("httpkit/test")).unwrap();

        let head = &prepared.head;
        assert_eq!(head.method(), ureq::http::Method::POST);
        assert_eq!(head.headers()[ACCEPT], XML_CONTENT_TYPE);
        assert_eq!(head.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(head.headers()[CONTENT_LENGTH], "7");
        assert_eq!(head.headers()[USER_AGENT], "httpkit/test");
        assert!(matches!(prepared.body, Some(PendingBody::Stream(_))));
    }

    #[test]
    fn empty_accept_is_not_sent() {
        let opts = RequestOptions::new().accept("");
        let prepared = prepare("http://host/x", &HttpMethod::Get, opts, None).unwrap();
        assert!(prepared.head.headers().get(ACCEPT).is_none());
        assert!(prepared.head.headers().get(USER_AGENT).is_none());
        assert!(prepared.body.is_none());
    }

    #[test]
    fn unknown_length_body_has_no_content_length() {
        let body = Body::new(std::io::empty(), None, "application/x-ndjson");
        let opts = RequestOptions::new().body(body);
        let prepared = prepare("http://host/x", &HttpMethod::Put, opts, None).unwrap();
        assert!(prepared.head.headers().get(CONTENT_LENGTH).is_none());
        assert_eq!(prepared.head.headers()[CONTENT_TYPE], "application/x-ndjson");
    }

    #[test]
    fn form_sets_a_multipart_content_type() {
        let opts = RequestOptions::new().form(Form::new().field("a", "1"));
        let prepared = prepare("http://host/upload", &HttpMethod::Post, opts, None).unwrap();
        let content_type = prepared.head.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
        match prepared.body {
            Some(PendingBody::Form { boundary, .. }) => {
                assert_eq!(content_type, format!("multipart/form-data; boundary={boundary}"));
            }
            other => panic!("expected a form body, got {other:?}"),
        }
    }

    #[test]
    fn invalid_custom_method_is_a_request_error() {
        let opts = RequestOptions::new();
        let err = prepare(
            "http://host/x",
            &HttpMethod::Custom("NOT VALID".to_string()),
            opts,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn uri_includes_the_merged_query() {
        let opts = RequestOptions::new().query([("id", "7")]);
        let prepared = prepare("http://host/items?x=1", &HttpMethod::Get, opts, None).unwrap();
        assert_eq!(prepared.head.uri().to_string(), "http://host/items?x=1&id=7");
    }
}
