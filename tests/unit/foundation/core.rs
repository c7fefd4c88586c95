use super::*;

#[test]
fn frame_range_contains_boundaries() {
    let r = FrameRange::new(FrameIndex(2), FrameIndex(5)).unwrap();
    assert!(!r.contains(FrameIndex(1)));
    assert!(r.contains(FrameIndex(2)));
    assert!(r.contains(FrameIndex(4)));
    assert!(!r.contains(FrameIndex(5)));
}

#[test]
fn frame_range_rejects_inverted() {
    assert!(FrameRange::new(FrameIndex(5), FrameIndex(2)).is_err());
    let empty = FrameRange::new(FrameIndex(3), FrameIndex(3)).unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.len_frames(), 0);
}

#[test]
fn frame_new_validates_buffer_length() {
    assert!(Frame::new(2, 2, vec![0; 16]).is_ok());
    assert!(Frame::new(2, 2, vec![0; 15]).is_err());
    assert!(Frame::new(0, 2, vec![]).is_err());
}

#[test]
fn frame_filled_and_pixel_access() {
    let f = Frame::filled(3, 2, [10, 20, 30, 255]).unwrap();
    assert_eq!(f.pixel_count(), 6);
    assert_eq!(f.pixel(2, 1), [10, 20, 30, 255]);
    assert_eq!(f.byte_len(), 24);
}

#[test]
fn frame_clone_shares_buffer() {
    let a = Frame::filled(4, 4, [1, 2, 3, 4]).unwrap();
    let b = a.clone();
    assert_eq!(a, b);
    assert!(std::ptr::eq(a.data().as_ptr(), b.data().as_ptr()));
}
