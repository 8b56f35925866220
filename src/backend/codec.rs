//! JSON message codec for unary gRPC calls.
//!
//! Backend messages are opaque to the gateway, so requests and responses
//! travel as JSON documents instead of generated protobuf types.

use bytes::{Buf, BufMut};
use serde_json::Value;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Encoder for JsonEncoder {
    type Item = Value;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, buf: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        serde_json::to_writer(buf.writer(), &item).map_err(|e| Status::internal(e.to_string()))
    }
}

impl Decoder for JsonDecoder {
    type Item = Value;
    type Error = Status;

    fn decode(&mut self, buf: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        if !buf.has_remaining() {
            return Ok(Some(Value::Object(Default::default())));
        }
        let item = serde_json::from_reader(buf.reader())
            .map_err(|e| Status::internal(format!("undecodable backend response: {}", e)))?;
        Ok(Some(item))
    }
}

impl Codec for JsonCodec {
    type Encode = Value;
    type Decode = Value;
    type Encoder = JsonEncoder;
    type Decoder = JsonDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        JsonEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder
    }
}
