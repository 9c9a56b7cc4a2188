//! Text to command-token codec.
//!
//! Chat transports only recognise a command entity up to the first space, so a
//! free-form argument has to be folded into a single token before it can ride
//! along in a `/name_token` identifier. Spaces become [`SPACE_SENTINEL`]; every
//! other character is left untouched.
//!
//! Text that already contains the sentinel does not survive a round trip: the
//! sentinel decodes to a space. Such input is not expected from users and is
//! accepted as-is.

/// Sequence standing in for a single space inside a token.
pub const SPACE_SENTINEL: &str = "1X2U1";

/// Encodes free-form text into a command token.
pub fn encode(text: &str) -> String {
    text.replace(' ', SPACE_SENTINEL)
}

/// Decodes a command token back into text.
pub fn decode(token: &str) -> String {
    token.replace(SPACE_SENTINEL, " ")
}

/// Builds a `/<name>_<token>` command identifier.
pub fn encode_as_command(name: &str, text: &str) -> String {
    format!("/{}_{}", name, encode(text))
}
