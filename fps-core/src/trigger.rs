//! Trigger token extraction from the FPS event header.

use crate::decoder::DecodeError;
use crate::parser::parse_header;
use crate::types::{TriggerToken, TriggerWords};
use tracing::error;

/// Builds the FPS trigger token from the header at the start of `header_bytes`.
///
/// At most `capacity` tokens are produced (the FPS contributes one). A
/// header with `status == 0` fails with [`DecodeError::InvalidEvent`];
/// the token carried by that error must not be used as a trigger word.
/// `channel_id` names the readout the header came from and is only logged.
pub fn extract_trigger(
    header_bytes: &[u8],
    capacity: usize,
    channel_id: u32,
) -> Result<TriggerWords, DecodeError> {
    let header = parse_header(header_bytes)?;
    let token = TriggerToken::from_header(&header);

    if header.status == 0 {
        error!(
            event = header.event_number,
            channel = channel_id,
            stp0 = header.stp_data[0],
            stp1 = header.stp_data[1],
            stp2 = header.stp_data[2],
            "Bad QT event"
        );
        return Err(DecodeError::InvalidEvent {
            event_number: header.event_number,
            stp_data: header.stp_data,
            token,
        });
    }

    let tokens: Vec<TriggerToken> = std::iter::once(token).take(capacity).collect();
    Ok(TriggerWords {
        count: tokens.len(),
        tokens,
    })
}
