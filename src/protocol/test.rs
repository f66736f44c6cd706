use std::convert::TryFrom;

use crate::error::Error;
use crate::protocol::binary::BinaryProtocol;
use crate::protocol::{
  skip, FieldHeader, ListHeader, MapHeader, MessageType, Protocol, ProtocolLimits, SetHeader, TType,
};
use crate::test::init_logger;
use crate::transport::MemoryBuffer;

#[test]
fn test_type_tag_codes() {
  // ワイヤ上の値はすべての実装で共通
  let expected = [
    (TType::Stop, 0u8),
    (TType::Void, 1),
    (TType::Bool, 2),
    (TType::Byte, 3),
    (TType::Double, 4),
    (TType::I16, 6),
    (TType::I32, 8),
    (TType::I64, 10),
    (TType::String, 11),
    (TType::Struct, 12),
    (TType::Map, 13),
    (TType::Set, 14),
    (TType::List, 15),
  ];
  for (ttype, code) in expected.iter() {
    assert_eq!(*code, *ttype as u8);
    assert_eq!(Ok(*ttype), TType::try_from(*code));
  }

  for value in [5u8, 7, 9, 16, 0xFF].iter() {
    assert_eq!(Err(Error::IllegalTypeTag { value: *value }), TType::try_from(*value));
  }
}

#[test]
fn test_message_type_codes() {
  assert_eq!(Ok(MessageType::Call), MessageType::try_from(1u8));
  assert_eq!(Ok(MessageType::Reply), MessageType::try_from(2u8));
  assert_eq!(Ok(MessageType::Exception), MessageType::try_from(3u8));
  assert_eq!(Ok(MessageType::Oneway), MessageType::try_from(4u8));
  assert_eq!(Err(Error::IllegalMessageType { value: 0 }), MessageType::try_from(0u8));
  assert_eq!(Err(Error::IllegalMessageType { value: 5 }), MessageType::try_from(5u8));
}

#[test]
fn test_field_header_stop() {
  assert!(FieldHeader::stop().is_stop());
  assert!(!FieldHeader::new(TType::I32, 0).is_stop());
  assert_eq!(ProtocolLimits::default().max_depth, crate::protocol::DEFAULT_MAX_DEPTH);
}

/// 入れ子の struct/map/set/list を含む値の後に目印となる i32 を書き込む。
fn write_nested_struct<P: Protocol>(protocol: &mut P) {
  protocol.write_struct_begin("Outer").unwrap();

  protocol.write_field_begin(&FieldHeader::new(TType::String, 1)).unwrap();
  protocol.write_string("skipped").unwrap();
  protocol.write_field_end().unwrap();

  protocol.write_field_begin(&FieldHeader::new(TType::Map, 2)).unwrap();
  protocol.write_map_begin(&MapHeader::new(TType::I16, TType::List, 2)).unwrap();
  for key in 0..2i16 {
    protocol.write_i16(key).unwrap();
    protocol.write_list_begin(&ListHeader::new(TType::Double, 3)).unwrap();
    for value in 0..3 {
      protocol.write_double(value as f64 * 0.5).unwrap();
    }
    protocol.write_list_end().unwrap();
  }
  protocol.write_map_end().unwrap();
  protocol.write_field_end().unwrap();

  protocol.write_field_begin(&FieldHeader::new(TType::Struct, 3)).unwrap();
  protocol.write_struct_begin("Inner").unwrap();
  protocol.write_field_begin(&FieldHeader::new(TType::Set, 1)).unwrap();
  protocol.write_set_begin(&SetHeader::new(TType::Bool, 2)).unwrap();
  protocol.write_bool(true).unwrap();
  protocol.write_bool(false).unwrap();
  protocol.write_set_end().unwrap();
  protocol.write_field_end().unwrap();
  protocol.write_field_begin(&FieldHeader::new(TType::I64, 2)).unwrap();
  protocol.write_i64(-1).unwrap();
  protocol.write_field_end().unwrap();
  protocol.write_field_begin(&FieldHeader::new(TType::Byte, 3)).unwrap();
  protocol.write_byte(-7).unwrap();
  protocol.write_field_end().unwrap();
  protocol.write_field_stop().unwrap();
  protocol.write_struct_end().unwrap();
  protocol.write_field_end().unwrap();

  protocol.write_field_stop().unwrap();
  protocol.write_struct_end().unwrap();

  protocol.write_i32(0x5A5A5A5A).unwrap();
}

#[test]
fn test_skip_nested_struct() {
  init_logger();
  let mut protocol = BinaryProtocol::new(MemoryBuffer::new());
  write_nested_struct(&mut protocol);

  skip(&mut protocol, TType::Struct).unwrap();
  assert_eq!(0x5A5A5A5A, protocol.read_i32().unwrap());
  assert_eq!(0, protocol.transport().available());
}

#[test]
fn test_skip_primitives() {
  let mut protocol = BinaryProtocol::new(MemoryBuffer::new());
  protocol.write_bool(true).unwrap();
  protocol.write_byte(1).unwrap();
  protocol.write_i16(2).unwrap();
  protocol.write_i32(3).unwrap();
  protocol.write_i64(4).unwrap();
  protocol.write_double(5.0).unwrap();
  protocol.write_string("six").unwrap();

  let types = [TType::Bool, TType::Byte, TType::I16, TType::I32, TType::I64, TType::Double, TType::String];
  for ttype in types.iter() {
    skip(&mut protocol, *ttype).unwrap();
  }
  assert_eq!(0, protocol.transport().available());

  // Stop と Void は何も消費しない
  skip(&mut protocol, TType::Stop).unwrap();
  skip(&mut protocol, TType::Void).unwrap();
}

#[test]
fn test_skip_depth_limit() {
  init_logger();
  let limits = ProtocolLimits { max_depth: 2, ..ProtocolLimits::default() };
  let mut protocol = BinaryProtocol::with_limits(MemoryBuffer::new(), limits);

  // list<list<list<i32>>> は深さ 3
  protocol.write_list_begin(&ListHeader::new(TType::List, 1)).unwrap();
  protocol.write_list_begin(&ListHeader::new(TType::List, 1)).unwrap();
  protocol.write_list_begin(&ListHeader::new(TType::I32, 1)).unwrap();
  protocol.write_i32(0).unwrap();

  assert_eq!(Err(Error::DepthLimitExceeded { maximum: 2 }), skip(&mut protocol, TType::List));
}

#[test]
fn test_skip_truncated() {
  let mut protocol = BinaryProtocol::new(MemoryBuffer::new());
  protocol.write_field_begin(&FieldHeader::new(TType::I64, 1)).unwrap();
  protocol.write_i32(0).unwrap();

  let err = skip(&mut protocol, TType::Struct).unwrap_err();
  assert!(err.is_end_of_file());
}

#[test]
fn test_skip_zero_width_elements() {
  init_logger();

  // 幅を持たない要素型は要素数にかかわらず拒否される
  let mut protocol = BinaryProtocol::new(MemoryBuffer::new());
  protocol.write_list_begin(&ListHeader::new(TType::Void, 1_000_000)).unwrap();
  assert_eq!(Err(Error::IllegalTypeTag { value: 1 }), skip(&mut protocol, TType::List));

  protocol.write_set_begin(&SetHeader::new(TType::Stop, 1_000_000)).unwrap();
  assert_eq!(Err(Error::IllegalTypeTag { value: 0 }), skip(&mut protocol, TType::Set));

  protocol.write_map_begin(&MapHeader::new(TType::I32, TType::Void, 1_000_000)).unwrap();
  assert_eq!(Err(Error::IllegalTypeTag { value: 1 }), skip(&mut protocol, TType::Map));

  // 要素数 0 の通常のコンテナは読み飛ばせる
  protocol.write_map_begin(&MapHeader::new(TType::I32, TType::String, 0)).unwrap();
  skip(&mut protocol, TType::Map).unwrap();
  assert_eq!(0, protocol.transport().available());
}
