//! Request group function (126208, code 0) for Binary Switch Bank Status:
//! pair filtering, acknowledgement coding, and status replies.
mod helpers;

use helpers::{
    request_msg, RecordingSender, RecordingTarget, BROADCAST, DEVICE_ADDRESS, PEER_ADDRESS,
};
use korri_switchbank::core::N2kMsg;
use korri_switchbank::protocol::group_function::acknowledge::AcknowledgementView;
use korri_switchbank::protocol::group_function::binary_status::BinaryStatusGroupFunction;
use korri_switchbank::protocol::group_function::{
    GroupFunction, ParameterErrorCode, PgnErrorCode, TransmissionErrorCode,
};
use korri_switchbank::protocol::messages::binary_status::parse_binary_status;

const KEEP_INTERVAL: u32 = 0xFFFF_FFFF;
const KEEP_OFFSET: u16 = 0xFFFF;

fn run(
    handler: &mut BinaryStatusGroupFunction<RecordingTarget>,
    msg: &N2kMsg,
) -> RecordingSender {
    let mut sender = RecordingSender::default();
    let function = GroupFunction::parse(msg).expect("valid header");
    let handled = handler
        .handle(&function, msg, 0, &mut sender)
        .expect("handler must not fail");
    assert!(handled);
    sender
}

fn only_ack(sender: &RecordingSender) -> &N2kMsg {
    let acks = sender.group_function_messages();
    assert_eq!(acks.len(), 1, "expected exactly one acknowledgement");
    acks[0]
}

fn instances_sent(sender: &RecordingSender) -> Vec<u8> {
    sender
        .status_messages()
        .iter()
        .map(|msg| parse_binary_status(msg).expect("status payload").0)
        .collect()
}

//==================================================================================PROPERTIES
#[test]
/// The acknowledgement always carries one code per announced pair.
fn test_ack_code_count_matches_pairs() {
    for count in 0u8..=6 {
        let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[0, 1]));
        // First pair selects a missing bank, the rest repeat the selector.
        let mut pairs = Vec::new();
        for _ in 0..count {
            pairs.extend_from_slice(&[1, 9]);
        }
        // An interval change is refused, which forces an acknowledgement even with no pairs.
        let msg = request_msg(DEVICE_ADDRESS, 1000, 0, count, &pairs);
        let sender = run(&mut handler, &msg);

        let ack_msg = only_ack(&sender);
        let ack = AcknowledgementView::parse(ack_msg).unwrap();
        assert_eq!(ack.parameter_count(), count);
        assert_eq!(ack_msg.len(), 6 + (count as usize).div_ceil(2));
        for index in 0..count {
            assert!(ack.parameter_code(index).is_some());
        }
        assert_eq!(ack.parameter_code(count), None);
    }
}

#[test]
/// When every selected instance is unknown, nothing but the acknowledgement goes out.
fn test_unknown_instances_send_no_status() {
    let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[0, 1, 2]));
    let msg = request_msg(DEVICE_ADDRESS, KEEP_INTERVAL, KEEP_OFFSET, 2, &[1, 8, 1, 9]);
    let sender = run(&mut handler, &msg);

    assert!(sender.status_messages().is_empty());
    let ack = AcknowledgementView::parse(only_ack(&sender)).unwrap();
    assert_eq!(
        ack.parameter_code(0),
        Some(ParameterErrorCode::RequestOrCommandParameterOutOfRange as u8)
    );
    assert_eq!(handler.target().status_calls.get(), 0);
}

#[test]
/// A single valid selector yields exactly one status message.
fn test_single_selector_one_status() {
    let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[3, 7, 11]));
    let msg = request_msg(DEVICE_ADDRESS, KEEP_INTERVAL, KEEP_OFFSET, 1, &[1, 7]);
    let sender = run(&mut handler, &msg);

    assert_eq!(instances_sent(&sender), vec![7]);
    assert!(sender.group_function_messages().is_empty());
    let status = sender.status_messages()[0];
    assert_eq!(status.destination, PEER_ADDRESS);
}

#[test]
/// A second instance selector is rejected even when it names a valid bank.
fn test_second_selector_rejected() {
    let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[3, 7]));
    let msg = request_msg(DEVICE_ADDRESS, KEEP_INTERVAL, KEEP_OFFSET, 2, &[1, 3, 1, 7]);
    let sender = run(&mut handler, &msg);

    let ack = AcknowledgementView::parse(only_ack(&sender)).unwrap();
    assert_eq!(ack.parameter_code(0), Some(ParameterErrorCode::Acknowledge as u8));
    assert_eq!(
        ack.parameter_code(1),
        Some(ParameterErrorCode::RequestOrCommandParameterOutOfRange as u8)
    );
    assert!(sender.status_messages().is_empty());
    // The second selector is never looked up.
    assert_eq!(*handler.target().has_instance_calls.borrow(), vec![3]);
}

#[test]
/// An unknown field aborts decoding: later pairs are coded but never read.
fn test_unknown_field_aborts_decoding() {
    let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[0, 1]));
    // pair 0 ok, pair 1 unknown field 40, pairs 2-3 would be valid selectors
    let msg = request_msg(
        DEVICE_ADDRESS,
        KEEP_INTERVAL,
        KEEP_OFFSET,
        4,
        &[1, 0, 40, 0, 1, 1, 1, 0],
    );
    let sender = run(&mut handler, &msg);

    let ack = AcknowledgementView::parse(only_ack(&sender)).unwrap();
    let codes: Vec<u8> = (0..4).filter_map(|i| ack.parameter_code(i)).collect();
    assert_eq!(
        codes,
        vec![
            ParameterErrorCode::Acknowledge as u8,
            ParameterErrorCode::InvalidRequestOrCommandParameterField as u8,
            ParameterErrorCode::TemporarilyUnableToComply as u8,
            ParameterErrorCode::TemporarilyUnableToComply as u8,
        ]
    );
    assert_eq!(*handler.target().has_instance_calls.borrow(), vec![0]);
    assert!(sender.status_messages().is_empty());
}

#[test]
/// Broadcast requests never produce an acknowledgement, even on total failure.
fn test_broadcast_never_acknowledged() {
    let cases: [(u32, u16, u8, &[u8]); 4] = [
        (KEEP_INTERVAL, KEEP_OFFSET, 1, &[1, 9]),
        (KEEP_INTERVAL, KEEP_OFFSET, 2, &[7, 0, 1, 0]),
        (1000, 0, 1, &[1, 0]),
        (1000, 0, 0, &[]),
    ];
    for (interval, offset, count, pairs) in cases {
        let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[0, 1]));
        let msg = request_msg(BROADCAST, interval, offset, count, pairs);
        let sender = run(&mut handler, &msg);
        assert!(sender.group_function_messages().is_empty());
        for status in sender.status_messages() {
            assert_eq!(status.destination, BROADCAST);
        }
    }
}

//==================================================================================SCENARIOS
#[test]
/// Broadcast, no pairs: the full status of every bank, no acknowledgement.
fn test_broadcast_all_banks() {
    let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[2, 4, 6]));
    let msg = request_msg(BROADCAST, KEEP_INTERVAL, KEEP_OFFSET, 0, &[]);
    let sender = run(&mut handler, &msg);

    assert_eq!(instances_sent(&sender), vec![2, 4, 6]);
    assert!(sender.group_function_messages().is_empty());
    assert_eq!(sender.sent.len(), 3);
}

#[test]
/// Unicast `(1, 7)` for a missing bank: one out-of-range acknowledgement, no status.
fn test_unicast_missing_bank() {
    let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[0, 1]));
    let msg = request_msg(DEVICE_ADDRESS, KEEP_INTERVAL, KEEP_OFFSET, 1, &[1, 7]);
    let sender = run(&mut handler, &msg);

    assert_eq!(sender.sent.len(), 1);
    let ack_msg = only_ack(&sender);
    assert_eq!(ack_msg.destination, PEER_ADDRESS);
    assert_eq!(ack_msg.priority, 3);
    let ack = AcknowledgementView::parse(ack_msg).unwrap();
    assert_eq!(ack.pgn(), 127_501);
    assert_eq!(ack.pgn_code(), PgnErrorCode::Acknowledge as u8);
    assert_eq!(ack.transmission_code(), TransmissionErrorCode::Acknowledge as u8);
    assert_eq!(ack.parameter_count(), 1);
    assert_eq!(
        ack.parameter_code(0),
        Some(ParameterErrorCode::RequestOrCommandParameterOutOfRange as u8)
    );
}

//==================================================================================TRANSMISSION
#[test]
/// The interval callback always runs with the recorded instance.
fn test_interval_callback_receives_recorded_instance() {
    let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[0, 1]));
    let msg = request_msg(DEVICE_ADDRESS, 500, 20, 1, &[1, 9]);
    run(&mut handler, &msg);
    assert_eq!(handler.target().interval_calls, vec![(9, 500, 20)]);

    let mut handler = BinaryStatusGroupFunction::new(RecordingTarget::new(&[0, 1]));
    let msg = request_msg(DEVICE_ADDRESS, 500, 20, 0, &[]);
    run(&mut handler, &msg);
    assert_eq!(handler.target().interval_calls, vec![(0xFF, 500, 20)]);
}

#[test]
/// An accepted interval change is silent when the status follows.
fn test_accepted_interval_change() {
    let mut target = RecordingTarget::new(&[0, 1]);
    target.accept_interval = true;
    let mut handler = BinaryStatusGroupFunction::new(target);
    let msg = request_msg(DEVICE_ADDRESS, 500, 20, 1, &[1, 1]);
    let sender = run(&mut handler, &msg);

    assert!(sender.group_function_messages().is_empty());
    assert_eq!(instances_sent(&sender), vec![1]);
}

#[test]
/// Without a status producer the matched request reports "temporarily not available".
fn test_no_status_producer() {
    let mut target = RecordingTarget::new(&[0, 1]);
    target.provides_status = false;
    let mut handler = BinaryStatusGroupFunction::new(target);
    let msg = request_msg(DEVICE_ADDRESS, KEEP_INTERVAL, KEEP_OFFSET, 0, &[]);
    let sender = run(&mut handler, &msg);

    let ack = AcknowledgementView::parse(only_ack(&sender)).unwrap();
    assert_eq!(ack.pgn_code(), PgnErrorCode::PgnTemporarilyNotAvailable as u8);
    assert!(sender.status_messages().is_empty());
    assert_eq!(handler.target().status_calls.get(), 0);
}

#[test]
/// A producer that wraps around is stopped at the first repeated instance.
fn test_status_loop_stops_on_wrap() {
    struct Wrapping;
    impl korri_switchbank::protocol::group_function::binary_status::BinaryStatusTarget for Wrapping {
        fn has_instance(&self, _instance: u8) -> bool {
            true
        }
        fn next_status_message(&mut self, instance: &mut u8, msg: &mut N2kMsg, _advance: bool) -> bool {
            // 0 -> 1 -> 0 -> 1 ...
            *instance = if *instance == 0 { 1 } else { 0 };
            korri_switchbank::protocol::messages::binary_status::set_binary_status(
                msg,
                *instance,
                Default::default(),
            )
            .is_ok()
        }
    }

    let mut handler = BinaryStatusGroupFunction::new(Wrapping);
    let msg = request_msg(DEVICE_ADDRESS, KEEP_INTERVAL, KEEP_OFFSET, 0, &[]);
    let function = GroupFunction::parse(&msg).unwrap();
    let mut sender = RecordingSender::default();
    handler.handle(&function, &msg, 0, &mut sender).unwrap();

    let sent: Vec<u8> = sender
        .status_messages()
        .iter()
        .map(|m| parse_binary_status(m).unwrap().0)
        .collect();
    assert_eq!(sent, vec![0, 1]);
}
