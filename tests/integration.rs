use std::{cell::RefCell, rc::Rc, str::from_utf8};

use money_transfer::{
    bin_utils::{Service, ServiceError},
    engine::TransferError,
};

const TEST_FILE: &str = include_str!("transfers.csv");

#[test]
fn process_requests() {
    let mut output = Vec::new();
    let errors: Rc<RefCell<Vec<ServiceError>>> = Rc::default();
    let sink = Rc::clone(&errors);

    let service = Service {
        input: TEST_FILE.as_bytes(),
        output: &mut output,
        error_printer: Box::new(move |_line, err| sink.borrow_mut().push(err)),
    };
    service.run().unwrap();

    let lines: Vec<String> = from_utf8(&output)
        .unwrap()
        .lines()
        .map(ToOwned::to_owned)
        .collect();
    assert_eq!(
        lines,
        [
            "account,owner,balance,currency,version",
            // 1000.00 - 50.50 - 101.00 across two fee-charging transfers
            "1,Alice,848.5000,USD,2",
            // 500.00 + 50.00 * 144.66
            "2,Bob,7733.0000,JPN,1",
            // created mid-batch with 250.00, then credited 100.00
            "3,Carol,350.0000,USD,1",
        ]
    );

    let errors = errors.borrow();
    assert_eq!(errors.len(), 4);
    assert!(matches!(
        errors[0],
        ServiceError::TransferErr(TransferError::InsufficientFunds { .. })
    ));
    assert!(matches!(
        errors[1],
        ServiceError::TransferErr(TransferError::RateNotFound { .. })
    ));
    assert!(matches!(
        errors[2],
        ServiceError::TransferErr(TransferError::InvalidTransfer(_))
    ));
    assert!(matches!(errors[3], ServiceError::RequestErr(_)));
}
