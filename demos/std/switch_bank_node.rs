//! Switch bank node walkthrough: feed hand-built messages to a two-bank node
//! and print what it would put on the bus.

use embassy_time::Instant;
use korri_switchbank::{
    application::switch_bank::{SwitchBankConfig, SwitchBankNode},
    core::N2kMsg,
    protocol::{
        group_function::acknowledge::AcknowledgementView,
        messages::{
            binary_status::{parse_binary_status, set_switch_bank_control, BinaryStatus, OnOff},
            PGN_BINARY_STATUS, PGN_GROUP_FUNCTION,
        },
        transport::outbox::Outbox,
    },
};

const NODE_ADDRESS: u8 = 0x20;
const TOOL_ADDRESS: u8 = 0x35;

fn print_outbox(outbox: &Outbox<16>) {
    while let Some(outbound) = outbox.pop() {
        let msg = outbound.msg;
        match msg.pgn {
            PGN_BINARY_STATUS => {
                let (instance, status) = parse_binary_status(&msg).expect("status payload");
                let on: Vec<u8> = status
                    .items()
                    .filter(|(_, state)| *state == OnOff::On)
                    .map(|(item, _)| item)
                    .collect();
                println!(
                    "  -> 127501 to 0x{:02X}: bank {} on={:?}",
                    msg.destination, instance, on
                );
            }
            PGN_GROUP_FUNCTION => match AcknowledgementView::parse(&msg) {
                Some(ack) => println!(
                    "  -> 126208 ack to 0x{:02X}: pgn {} pgn_code {:?} tx_code {:?} params {}",
                    msg.destination,
                    ack.pgn(),
                    ack.pgn_code(),
                    ack.transmission_code(),
                    ack.parameter_count()
                ),
                None => println!(
                    "  -> 126208 function {} to 0x{:02X}: {:02X?}",
                    msg.data()[0],
                    msg.destination,
                    msg.data()
                ),
            },
            pgn => println!("  -> {} to 0x{:02X}", pgn, msg.destination),
        }
    }
}

fn group_function(function: u8, body: &[u8]) -> N2kMsg {
    let mut msg = N2kMsg::new(PGN_GROUP_FUNCTION, 3, NODE_ADDRESS);
    msg.source = TOOL_ADDRESS;
    msg.add_u8(function).unwrap();
    msg.add_u24(PGN_BINARY_STATUS).unwrap();
    for byte in body {
        msg.add_u8(*byte).unwrap();
    }
    msg
}

fn main() {
    println!("=== Switch Bank Node Example ===\n");

    let config = SwitchBankConfig::new()
        .with_instances([0, 1])
        .with_period_ms(2_000)
        .with_offset_ms(0);
    let mut node = SwitchBankNode::new(config).expect("valid configuration");
    let mut outbox: Outbox<16> = Outbox::new();
    let mut now = Instant::from_millis(0);
    node.start(now);

    println!("1. Start-up broadcast:");
    node.poll_status(now, 0, &mut outbox).unwrap();
    print_outbox(&outbox);

    println!("\n2. Local switch 3 on (bank 0, item 4):");
    node.bank_mut().set_switch(3, true);
    now += embassy_time::Duration::from_millis(10);
    node.poll_status(now, 0, &mut outbox).unwrap();
    print_outbox(&outbox);

    println!("\n3. Switch Bank Control from the tool, bank 1 item 2 on:");
    let mut control = BinaryStatus::unavailable();
    control.set_item(2, OnOff::On);
    let mut msg = N2kMsg::default();
    set_switch_bank_control(&mut msg, 1, control).unwrap();
    msg.source = TOOL_ADDRESS;
    node.handle_msg(&msg, 0, &mut outbox).unwrap();
    for (index, on) in node.bank_mut().take_changes() {
        println!("  switch {} changed to {}", index, on);
    }
    node.poll_status(now, 0, &mut outbox).unwrap();
    print_outbox(&outbox);

    println!("\n4. Request bank 1 every 500 ms:");
    let mut body = Vec::new();
    body.extend_from_slice(&500u32.to_le_bytes());
    body.extend_from_slice(&0xFFFFu16.to_le_bytes());
    body.extend_from_slice(&[1, 1, 1]);
    node.handle_msg(&group_function(0, &body), 0, &mut outbox).unwrap();
    print_outbox(&outbox);
    println!("  period now {} ms", node.bank().scheduler().period_ms());

    println!("\n5. Request an unknown bank:");
    let mut body = Vec::new();
    body.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    body.extend_from_slice(&0xFFFFu16.to_le_bytes());
    body.extend_from_slice(&[1, 1, 9]);
    node.handle_msg(&group_function(0, &body), 0, &mut outbox).unwrap();
    print_outbox(&outbox);

    println!("\n6. Write Fields: renumber bank 1 to 7:");
    node.handle_msg(&group_function(5, &[0x01, 1, 1, 1, 1, 1, 7]), 0, &mut outbox)
        .unwrap();
    print_outbox(&outbox);
    println!("  instances now {:?}", node.bank().instances());

    println!("\n7. Command on 127501 is refused:");
    node.handle_msg(&group_function(1, &[0x08, 1, 1, 7]), 0, &mut outbox)
        .unwrap();
    print_outbox(&outbox);

    println!("\n=== Example completed ===");
}
