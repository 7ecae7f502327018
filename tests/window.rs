use app_flash::{StorageWindow, APP_DATA_END, APP_DATA_START, PAGE_SIZE};

#[test]
fn app_data_window() {
    let window = StorageWindow::APP_DATA;
    assert_eq!(window.start(), APP_DATA_START);
    assert_eq!(window.end(), APP_DATA_END);
    assert_eq!(window.len(), 0x8000);
    assert!(window.is_aligned(PAGE_SIZE));
    assert_eq!(StorageWindow::default(), window);
}

#[test]
fn empty_window_is_rejected() {
    assert!(StorageWindow::new(0x78000, 0x78000).is_none());
    assert!(StorageWindow::new(0x78000, 0x70000).is_none());
}

#[test]
fn contains() {
    let window = StorageWindow::new(0x70000, 0x78000).unwrap();

    assert!(window.contains(0x70000, 4));
    assert!(window.contains(0x70000, 0x8000));
    assert!(window.contains(0x77FFC, 4));
    assert!(window.contains(0x74000, 0));

    assert!(!window.contains(0x77FFC, 8));
    assert!(!window.contains(0x6FFFC, 8));
    assert!(!window.contains(0x6F000, 4));
    assert!(!window.contains(0x78000, 0));
    assert!(!window.contains(0x78000, 4));
    assert!(!window.contains(0x70000, 0x8004));
    assert!(!window.contains(0x70000, u32::MAX));
}

#[test]
fn alignment() {
    let window = StorageWindow::new(0x70400, 0x78000).unwrap();
    assert!(window.is_aligned(4));
    assert!(!window.is_aligned(PAGE_SIZE));
    assert!(!window.is_aligned(0));
    assert_eq!(window.range(), 0x70400..0x78000);
}
