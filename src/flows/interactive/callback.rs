// std
use std::{io::ErrorKind, net::Ipv4Addr};
// crates.io
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
	task::JoinSet,
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, ListenerError},
	obs::{self, FlowKind},
};

const KIND: FlowKind = FlowKind::InteractiveLogin;
const MAX_REQUEST_HEAD: usize = 16 * 1024;
const REQUEST_HEAD_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Result carried by the single accepted callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
	/// The provider redirected back with an authorization code.
	Code(String),
	/// The provider redirected back with an `error` parameter.
	Denied {
		/// Provider error code.
		error: String,
		/// Optional provider-supplied description.
		description: Option<String>,
	},
}

#[derive(Debug, PartialEq, Eq)]
enum CallbackRequest {
	/// Some other path; answered with 404 and ignored.
	Unrelated,
	/// Redirect path without `code` or `error`; answered with 400 and ignored.
	Incomplete,
	/// A callback carrying a code or an error.
	Callback { outcome: CallbackOutcome, state: Option<String> },
}

/// Loopback listener that accepts exactly one authorization callback.
pub(super) struct CallbackListener {
	listener: TcpListener,
	port: u16,
}
impl CallbackListener {
	pub(super) async fn bind(port: u16) -> Result<Self, ListenerError> {
		let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.map_err(|err| {
			if err.kind() == ErrorKind::AddrInUse {
				ListenerError::AlreadyBound { port }
			} else {
				ListenerError::Io(err)
			}
		})?;
		let port = listener.local_addr()?.port();

		Ok(Self { listener, port })
	}

	pub(super) fn redirect_uri(&self) -> Result<Url> {
		Url::parse(&format!("http://127.0.0.1:{}/callback", self.port))
			.map_err(|source| ConfigError::InvalidUrl { field: "redirect_uri", source }.into())
	}

	/// Waits for the callback on `path`, consuming (and thereby closing) the listener.
	///
	/// Connections are read concurrently, each under its own deadline, so an idle socket (a
	/// browser preconnect, a half-open health check) never holds up the real callback. Pending
	/// reads are aborted once this returns.
	pub(super) async fn wait_for_callback(
		self,
		path: &str,
		expected_state: &str,
		cancel: &CancellationToken,
	) -> Result<CallbackOutcome> {
		let mut pending = JoinSet::new();

		loop {
			let (mut stream, head) = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				Some(read) = pending.join_next(), if !pending.is_empty() => match read {
					Ok((stream, Ok(head))) => (stream, head),
					Ok((_, Err(err))) => {
						obs::trace_ignored_request(KIND, "unreadable", Some(&err));

						continue;
					},
					Err(_) => continue,
				},
				accepted = self.listener.accept() => {
					let (stream, _) = accepted.map_err(ListenerError::from)?;

					pending.spawn(read_request_head(stream));

					continue;
				},
			};

			match parse_callback_request(&head, path) {
				CallbackRequest::Unrelated => {
					let answered = respond(&mut stream, "404 Not Found", "Not found", "").await;

					obs::trace_ignored_request(KIND, "unrelated_path", answered.err().as_ref());
				},
				CallbackRequest::Incomplete => {
					let answered = respond(
						&mut stream,
						"400 Bad Request",
						"Missing parameters",
						"The callback carried neither an authorization code nor an error.",
					)
					.await;

					obs::trace_ignored_request(KIND, "incomplete_callback", answered.err().as_ref());
				},
				CallbackRequest::Callback { state, .. }
					if state.as_deref() != Some(expected_state) =>
				{
					respond(
						&mut stream,
						"400 Bad Request",
						"Authorization failed",
						"The callback state did not match this login attempt.",
					)
					.await
					.map_err(ListenerError::from)?;

					return Err(Error::AuthorizationDenied {
						error: "state_mismatch".into(),
						description: Some("Callback state did not match the request.".into()),
					});
				},
				CallbackRequest::Callback { outcome, .. } => {
					let (heading, detail) = match &outcome {
						CallbackOutcome::Code(_) => (
							"Authorization complete",
							"You can close this window and return to the application.",
						),
						CallbackOutcome::Denied { .. } => (
							"Authorization failed",
							"The provider did not grant access. You can close this window.",
						),
					};

					respond(&mut stream, "200 OK", heading, detail)
						.await
						.map_err(ListenerError::from)?;

					return Ok(outcome);
				},
			}
		}
	}
}

async fn read_request_head(mut stream: TcpStream) -> (TcpStream, std::io::Result<String>) {
	let head = match tokio::time::timeout(REQUEST_HEAD_TIMEOUT, read_head(&mut stream)).await {
		Ok(head) => head,
		Err(_) => Err(ErrorKind::TimedOut.into()),
	};

	(stream, head)
}

async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
	let mut head = Vec::with_capacity(1024);
	let mut chunk = [0_u8; 1024];

	loop {
		let read = stream.read(&mut chunk).await?;

		if read == 0 {
			break;
		}

		head.extend_from_slice(&chunk[..read]);

		if head.windows(4).any(|window| window == b"\r\n\r\n") || head.len() >= MAX_REQUEST_HEAD {
			break;
		}
	}

	Ok(String::from_utf8_lossy(&head).into_owned())
}

fn parse_callback_request(head: &str, path: &str) -> CallbackRequest {
	let Some(target) = head.lines().next().and_then(|line| line.split_whitespace().nth(1)) else {
		return CallbackRequest::Unrelated;
	};
	let Ok(url) = Url::parse(&format!("http://127.0.0.1{target}")) else {
		return CallbackRequest::Unrelated;
	};

	if url.path() != path {
		return CallbackRequest::Unrelated;
	}

	let mut code = None;
	let mut state = None;
	let mut error = None;
	let mut description = None;

	for (key, value) in url.query_pairs() {
		match key.as_ref() {
			"code" => code = Some(value.into_owned()),
			"state" => state = Some(value.into_owned()),
			"error" => error = Some(value.into_owned()),
			"error_description" => description = Some(value.into_owned()),
			_ => {},
		}
	}

	let outcome = match (error, code) {
		(Some(error), _) => CallbackOutcome::Denied { error, description },
		(None, Some(code)) if !code.is_empty() => CallbackOutcome::Code(code),
		_ => return CallbackRequest::Incomplete,
	};

	CallbackRequest::Callback { outcome, state }
}

async fn respond(
	stream: &mut TcpStream,
	status: &str,
	heading: &str,
	detail: &str,
) -> std::io::Result<()> {
	let body = format!(
		"<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{heading}</title></head>\
		 <body><h1>{heading}</h1><p>{detail}</p></body></html>"
	);
	let response = format!(
		"HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n\
		 Connection: close\r\n\r\n{body}",
		body.len()
	);

	stream.write_all(response.as_bytes()).await?;
	stream.flush().await?;
	stream.shutdown().await
}
