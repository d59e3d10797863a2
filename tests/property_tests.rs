//! Property tests: arbitrary operation sequences keep the session consistent
//! with a simple model of a single-device connection.

mod common;

use common::plain_session;
use proptest::prelude::*;
use std::collections::{HashMap, VecDeque};
use threadsafe_serial::MockPortDriver;

const PATHS: [&str; 3] = ["/dev/ttyUSB0", "/dev/ttyUSB1", "COM3"];

#[derive(Debug, Clone)]
enum Op {
    Open(usize),
    Close,
    Read,
    Write(String),
    SetBaud(u32),
    Push(String),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..PATHS.len()).prop_map(Op::Open),
        Just(Op::Close),
        Just(Op::Read),
        "[a-z]{1,8}".prop_map(Op::Write),
        prop::sample::select(vec![9600u32, 19_200, 57_600, 115_200]).prop_map(Op::SetBaud),
        "[a-z]{1,8}".prop_map(Op::Push),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_session_matches_model(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let driver = MockPortDriver::new();
        let session = plain_session(&driver);

        let mut open_path: Option<&str> = None;
        let mut baud = 9600u32;
        let mut queued: HashMap<&str, VecDeque<String>> = HashMap::new();

        for op in ops {
            match op {
                Op::Open(i) => {
                    let opened = session.open(PATHS[i]);
                    prop_assert_eq!(opened, open_path.is_none());
                    if opened {
                        open_path = Some(PATHS[i]);
                    }
                }
                Op::Close => {
                    prop_assert!(session.close());
                    open_path = None;
                }
                Op::Read => {
                    let line = session.read_line(500);
                    let expected = open_path
                        .and_then(|path| queued.get_mut(path))
                        .and_then(VecDeque::pop_front);
                    prop_assert_eq!(line, expected);
                }
                Op::Write(data) => {
                    prop_assert_eq!(session.write(&data), open_path.is_some());
                }
                Op::SetBaud(rate) => {
                    prop_assert!(session.set_baud_rate(rate));
                    baud = rate;
                }
                Op::Push(line) => {
                    let path = open_path.unwrap_or(PATHS[0]);
                    driver.push_line(path, line.clone());
                    queued.entry(path).or_default().push_back(line);
                }
            }

            let status = session.status();
            prop_assert_eq!(status.connected, open_path.is_some());
            prop_assert_eq!(status.path.as_deref(), open_path);
            prop_assert_eq!(status.baud_rate, baud);
        }

        session.close();
        prop_assert_eq!(driver.open_handles(), 0);
    }
}
