//! Property tests for OwnedCell address stability and teardown counting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use tether_core::OwnedCell;

proptest! {
    #[test]
    fn test_address_stable_across_access(payload in proptest::collection::vec(any::<u8>(), 0..256), edits in 0usize..16) {
        let expected_len = payload.len();
        let mut cell = OwnedCell::new(move || payload).unwrap();
        let addr = cell.as_ptr();

        for i in 0..edits {
            cell.get_mut().get_mut().push(u8::try_from(i).unwrap());
            prop_assert_eq!(cell.as_ptr(), addr);
            prop_assert_eq!(&*cell as *const Vec<u8>, addr.as_ptr().cast_const());
        }

        prop_assert_eq!(cell.len(), expected_len + edits);
    }

    #[test]
    fn test_tear_down_runs_exactly_once(value in any::<u64>(), close_explicitly in any::<bool>()) {
        let tear_downs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&tear_downs);
        let cell = OwnedCell::builder(move || value)
            .tear_down(move |seen| {
                assert_eq!(*seen, value);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();
        prop_assert_eq!(tear_downs.load(Ordering::SeqCst), 0);

        if close_explicitly {
            cell.close().unwrap();
        } else {
            drop(cell);
        }

        prop_assert_eq!(tear_downs.load(Ordering::SeqCst), 1);
    }
}
