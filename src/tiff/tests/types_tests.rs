//! Tests for the TIFF types module

extern crate std;

use crate::tiff::constants::{field_types, tags};
use crate::tiff::ifd::{Ifd, TagData, TagRecord};
use crate::tiff::types::TiffStructure;

#[test]
fn test_tiff_creation() {
    let tiff = TiffStructure::new(false, false);
    std::assert!(!tiff.big_tiff);
    std::assert_eq!(tiff.ifd_count(), 0);
    std::assert!(tiff.main_ifd().is_none());
}

#[test]
fn test_tiff_with_nested_ifds() {
    let mut tiff = TiffStructure::new(true, true);

    let mut main_ifd = Ifd::new();
    main_ifd.insert(tags::IMAGE_WIDTH, TagRecord::integers(field_types::LONG, vec![1024]));
    main_ifd.insert(tags::IMAGE_LENGTH, TagRecord::integers(field_types::LONG, vec![768]));

    let mut overview = Ifd::new();
    overview.insert(tags::IMAGE_WIDTH, TagRecord::integers(field_types::LONG, vec![512]));
    overview.insert(tags::IMAGE_LENGTH, TagRecord::integers(field_types::LONG, vec![384]));

    let mut holder = TagRecord::sub_ifd_holder(field_types::IFD);
    holder.ifds.push(vec![overview.clone(), overview]);
    main_ifd.insert(tags::SUB_IFD, holder);
    tiff.ifds.push(main_ifd);

    std::assert!(tiff.big_tiff);
    std::assert_eq!(tiff.ifd_count(), 1);
    std::assert_eq!(tiff.total_ifd_count(), 3);

    let main = tiff.main_ifd().unwrap();
    std::assert_eq!(main.get_dimensions(), Some((1024, 768)));
    std::assert!(main.get(tags::SUB_IFD).unwrap().has_sub_ifds());
    std::assert_eq!(main.get(tags::SUB_IFD).unwrap().ifds[0][1].get_dimensions(), Some((512, 384)));
}

#[test]
fn test_set_integers_replaces_values() {
    let mut ifd = Ifd::new();
    ifd.set_integers(tags::COMPRESSION, field_types::SHORT, vec![1]);
    ifd.set_integers(tags::COMPRESSION, field_types::SHORT, vec![32773]);

    let record = ifd.get(tags::COMPRESSION).unwrap();
    std::assert_eq!(record.data, TagData::Integers(vec![32773]));
    std::assert_eq!(record.count, 1);
    std::assert_eq!(ifd.entry_count(), 1);
}
