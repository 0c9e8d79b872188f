//! `Link` response header parsing (RFC 8288 subset).

// crates.io
use oauth2::http::{HeaderMap, header::LINK};
// self
use crate::_prelude::*;

/// Relation name attached to a pagination link.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LinkRelation {
	/// `rel="first"`.
	First,
	/// `rel="last"`.
	Last,
	/// `rel="next"`.
	Next,
	/// `rel="prev"` (or the legacy `previous`).
	Prev,
	/// Any other relation, lower-cased.
	Other(String),
}
impl LinkRelation {
	/// Parses a single relation token (case-insensitive).
	pub fn parse(raw: &str) -> Self {
		match raw.to_ascii_lowercase().as_str() {
			"first" => Self::First,
			"last" => Self::Last,
			"next" => Self::Next,
			"prev" | "previous" => Self::Prev,
			other => Self::Other(other.to_owned()),
		}
	}

	/// Canonical relation name.
	pub fn as_str(&self) -> &str {
		match self {
			Self::First => "first",
			Self::Last => "last",
			Self::Next => "next",
			Self::Prev => "prev",
			Self::Other(name) => name,
		}
	}
}
impl Display for LinkRelation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// A relation paired with an absolute URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLink {
	/// Relation name.
	pub relation: LinkRelation,
	/// Target, resolved against the request URI.
	pub uri: Url,
}

/// All links advertised by one response, in header order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageLinks(Vec<PageLink>);
impl PageLinks {
	/// Parses every `Link` header value, resolving relative targets against `base`.
	///
	/// Entries whose target cannot be resolved are skipped. An entry with several
	/// space-separated relations yields one link per relation.
	pub fn parse<'a>(values: impl IntoIterator<Item = &'a str>, base: &Url) -> Self {
		let mut links = Vec::new();

		for value in values {
			parse_value(value, base, &mut links);
		}

		Self(links)
	}

	/// Reads the `Link` headers of a response.
	pub fn from_headers(headers: &HeaderMap, base: &Url) -> Self {
		Self::parse(headers.get_all(LINK).iter().filter_map(|value| value.to_str().ok()), base)
	}

	/// First link carrying `relation`.
	pub fn get(&self, relation: &LinkRelation) -> Option<&Url> {
		self.0.iter().find(|link| link.relation == *relation).map(|link| &link.uri)
	}

	/// Target of the `next` relation; `None` on the last page.
	pub fn next(&self) -> Option<&Url> {
		self.get(&LinkRelation::Next)
	}

	/// Iterator over all links.
	pub fn iter(&self) -> impl Iterator<Item = &PageLink> {
		self.0.iter()
	}

	/// Number of links.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when the response advertised no links.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

fn parse_value(value: &str, base: &Url, links: &mut Vec<PageLink>) {
	let mut rest = value;

	while let Some(open) = rest.find('<') {
		let after_open = &rest[open + 1..];
		let Some(close) = after_open.find('>') else {
			break;
		};
		let target = after_open[..close].trim();
		let (params, remainder) = split_params(&after_open[close + 1..]);

		rest = remainder;

		let Ok(uri) = base.join(target) else {
			continue;
		};

		for relation in relations(params) {
			links.push(PageLink { relation, uri: uri.clone() });
		}
	}
}

// Splits at the first comma outside a quoted string.
fn split_params(input: &str) -> (&str, &str) {
	let mut quoted = false;

	for (idx, ch) in input.char_indices() {
		match ch {
			'"' => quoted = !quoted,
			',' if !quoted => return (&input[..idx], &input[idx + 1..]),
			_ => {},
		}
	}

	(input, "")
}

fn relations(params: &str) -> Vec<LinkRelation> {
	params
		.split(';')
		.filter_map(|param| {
			let (key, value) = param.split_once('=')?;

			key.trim().eq_ignore_ascii_case("rel").then(|| value.trim().trim_matches('"'))
		})
		.flat_map(|value| value.split_whitespace().map(LinkRelation::parse))
		.collect()
}
