//! Unwrapping of `HC1:` payloads.
//!
//! The layers are peeled in a fixed order: Base45, zlib, COSE_Sign1 and
//! finally the CBOR claims set carried as the envelope payload. Each stage
//! reports its own [`DecodeError`] variant so a failure always names the
//! layer that could not be parsed.
//!
//! The COSE signature is exposed but never verified: this crate does not make
//! any trust decision about the decoded certificate.

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::io::Read;

use flate2::read::ZlibDecoder;
use serde_cbor::value::from_value;
use serde_cbor::{from_slice, Value};
use serde_derive::Deserialize;

use crate::error::DecodeError;

pub const HC1_FIELD: &str = "HC1:";

const HCERT_CLAIM_KEY: i128 = -260;
const DCC: i128 = 1;

const CLAIM_ISS: i128 = 1;
const CLAIM_EXP: i128 = 4;
const CLAIM_IAT: i128 = 6;

const HEADER_ALG: i128 = 1;
const HEADER_KID: i128 = 4;

#[derive(Debug, Deserialize, PartialEq)]
pub struct Vaccine {
    pub ci: String,
    pub co: String,
    pub dn: i32,
    pub dt: String,
    pub is: String,
    pub ma: String,
    pub mp: String,
    pub sd: i32,
    pub tg: String,
    pub vp: String,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct Test {
    pub tg: String,
    pub tt: String,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub ma: Option<String>,
    pub sc: String,
    pub tr: String,
    #[serde(default)]
    pub tc: Option<String>,
    pub co: String,
    pub is: String,
    pub ci: String,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct Recovery {
    pub tg: String,
    pub fr: String,
    pub co: String,
    pub is: String,
    pub df: String,
    pub du: String,
    pub ci: String,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct Name {
    #[serde(rename = "fn", default)]
    pub fn_: Option<String>,
    pub fnt: String,
    #[serde(default)]
    pub gn: Option<String>,
    #[serde(default)]
    pub gnt: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct Certificate {
    pub nam: Name,
    pub dob: String,
    #[serde(default)]
    pub v: Vec<Vaccine>,
    #[serde(default)]
    pub t: Vec<Test>,
    #[serde(default)]
    pub r: Vec<Recovery>,
    pub ver: String,
}

/// CWT claims that sit next to the hcert claim.
#[derive(Debug, Default, PartialEq)]
pub struct Claims {
    pub issuer: Option<String>,
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
}

/// A parsed COSE_Sign1 structure. Nothing here is verified.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub protected_raw: Vec<u8>,
    pub protected: Value,
    pub unprotected: Value,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Envelope {
    /// Parses the four element COSE_Sign1 array. Tag 18, when present, is
    /// skipped by the CBOR reader.
    pub fn from_slice(data: &[u8]) -> Result<Envelope, DecodeError> {
        let (protected_raw, unprotected, payload, signature): (
            &[u8],
            Value,
            &[u8],
            &[u8],
        ) = from_slice(data).map_err(DecodeError::Envelope)?;

        let protected = if protected_raw.is_empty() {
            Value::Map(BTreeMap::new())
        } else {
            from_slice(protected_raw).map_err(DecodeError::Envelope)?
        };

        Ok(Envelope {
            protected_raw: protected_raw.to_vec(),
            protected,
            unprotected,
            payload: payload.to_vec(),
            signature: signature.to_vec(),
        })
    }

    pub fn payload_value(&self) -> Result<Value, DecodeError> {
        from_slice(&self.payload).map_err(DecodeError::Payload)
    }

    fn header(&self, label: i128) -> Option<&Value> {
        map_get(&self.protected, label)
            .or_else(|| map_get(&self.unprotected, label))
    }

    /// COSE algorithm identifier, e.g. -7 for ES256.
    pub fn algorithm(&self) -> Option<i128> {
        match self.header(HEADER_ALG) {
            Some(Value::Integer(alg)) => Some(*alg),
            _ => None,
        }
    }

    pub fn key_id(&self) -> Option<&[u8]> {
        match self.header(HEADER_KID) {
            Some(Value::Bytes(kid)) => Some(kid.as_slice()),
            _ => None,
        }
    }
}

/// Output of the whole unwrapping chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub envelope: Envelope,
    pub payload: Value,
}

impl Decoded {
    pub fn certificate(&self) -> Result<Certificate, DecodeError> {
        let eudccv1 = map_get(&self.payload, HCERT_CLAIM_KEY)
            .and_then(|hcert| map_get(hcert, DCC))
            .ok_or(DecodeError::MissingCertificate)?;

        from_value(eudccv1.clone()).map_err(DecodeError::Certificate)
    }

    pub fn claims(&self) -> Claims {
        let issuer = match map_get(&self.payload, CLAIM_ISS) {
            Some(Value::Text(iss)) => Some(iss.clone()),
            _ => None,
        };

        Claims {
            issuer,
            issued_at: map_get(&self.payload, CLAIM_IAT).and_then(as_timestamp),
            expires_at: map_get(&self.payload, CLAIM_EXP).and_then(as_timestamp),
        }
    }
}

fn map_get(value: &Value, key: i128) -> Option<&Value> {
    match value {
        Value::Map(m) => m.get(&Value::Integer(key)),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => i64::try_from(*i).ok(),
        Value::Float(f) if f.is_finite() => Some(*f as i64),
        _ => None,
    }
}

pub fn strip_header(data: &str) -> Result<&str, DecodeError> {
    data.trim_end()
        .strip_prefix(HC1_FIELD)
        .ok_or(DecodeError::InvalidHeader(HC1_FIELD))
}

pub fn decode_base45(data: &str) -> Result<Vec<u8>, DecodeError> {
    base45::decode(data).map_err(|e| DecodeError::Base45(e.to_string()))
}

pub fn inflate(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut zlibdecoder = ZlibDecoder::new(data);
    let mut inflated = Vec::new();
    zlibdecoder
        .read_to_end(&mut inflated)
        .map_err(DecodeError::Inflate)?;
    Ok(inflated)
}

/// Runs the header check and every unwrapping stage on a raw QR payload.
pub fn decode(data: &str) -> Result<Decoded, DecodeError> {
    let base45_data = strip_header(data)?;
    let compressed = decode_base45(base45_data)?;
    let cbor_data = inflate(&compressed)?;

    let envelope = Envelope::from_slice(&cbor_data)?;
    log::debug!(
        "COSE envelope: alg={:?}, {} payload bytes, {} signature bytes (not verified)",
        envelope.algorithm(),
        envelope.payload.len(),
        envelope.signature.len()
    );
    let payload = envelope.payload_value()?;

    Ok(Decoded { envelope, payload })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    use super::*;

    // Taken from:
    // https://github.com/eu-digital-green-certificates/dgc-testdata/blob/main/IT/2DCode/raw/1.json
    // It is licensed under Apache-2.0 License.
    pub(crate) const VACCINE_RECORD_DATA: &str = "HC1:6BFOXN%TS3DH0YOJ58S S-W5HDC *M0II5XHC9B5G2+$N IOP-IA%NFQGRJPC%OQHIZC4.OI1RM8ZA.A5:S9MKN4NN3F85QNCY0O%0VZ001HOC9JU0D0HT0HB2PL/IB*09B9LW4T*8+DCMH0LDK2%K:XFE70*LP$V25$0Q:J:4MO1P0%0L0HD+9E/HY+4J6TH48S%4K.GJ2PT3QY:GQ3TE2I+-CPHN6D7LLK*2HG%89UV-0LZ 2ZJJ524-LH/CJTK96L6SR9MU9DHGZ%P WUQRENS431T1XCNCF+47AY0-IFO0500TGPN8F5G.41Q2E4T8ALW.INSV$ 07UV5SR+BNQHNML7 /KD3TU 4V*CAT3ZGLQMI/XI%ZJNSBBXK2:UG%UJMI:TU+MMPZ5$/PMX19UE:-PSR3/$NU44CBE6DQ3D7B0FBOFX0DV2DGMB$YPF62I$60/F$Z2I6IFX21XNI-LM%3/DF/U6Z9FEOJVRLVW6K$UG+BKK57:1+D10%4K83F+1VWD1NE";

    fn hc1(raw: &[u8]) -> String {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        let compressed = encoder.finish().unwrap();
        format!("{}{}", HC1_FIELD, base45::encode(&compressed))
    }

    fn expected_certificate() -> Certificate {
        Certificate {
            nam: Name {
                fn_: Some("Di Caprio".to_string()),
                fnt: "DI<CAPRIO".to_string(),
                gn: Some("Marilù Teresa".to_string()),
                gnt: Some("MARILU<TERESA".to_string()),
            },
            dob: "1977-06-16".to_string(),
            v: vec![Vaccine {
                ci: "01ITE7300E1AB2A84C719004F103DCB1F70A#6".to_string(),
                co: "IT".to_string(),
                dn: 2,
                dt: "2021-04-10".to_string(),
                is: "IT".to_string(),
                ma: "ORG-100030215".to_string(),
                mp: "EU/1/20/1528".to_string(),
                sd: 2,
                tg: "840539006".to_string(),
                vp: "1119349007".to_string(),
            }],
            t: vec![],
            r: vec![],
            ver: "1.0.0".to_string(),
        }
    }

    #[test]
    fn decode_test() {
        let decoded = decode(VACCINE_RECORD_DATA).unwrap();
        assert_eq!(decoded.certificate().unwrap(), expected_certificate());
        assert_eq!(decoded.envelope.algorithm(), Some(-7));
        assert_eq!(
            decoded.envelope.key_id(),
            Some(&[0x39, 0x30, 0x17, 0x68, 0xcd, 0xda, 0x05, 0x13][..])
        );
        assert_eq!(decoded.envelope.signature.len(), 64);
    }

    #[test]
    fn decode_tolerates_trailing_newline() {
        let data = format!("{}\n", VACCINE_RECORD_DATA);
        let decoded = decode(&data).unwrap();
        assert_eq!(decoded.certificate().unwrap(), expected_certificate());
    }

    #[test]
    fn fixture_claims() {
        let claims = decode(VACCINE_RECORD_DATA).unwrap().claims();
        assert_eq!(claims.issuer.as_deref(), Some("IT"));
        assert_eq!(claims.issued_at, Some(1621593224));
        assert_eq!(claims.expires_at, Some(1637148824));
    }

    #[test]
    fn missing_header_is_rejected_before_decoding() {
        // Would also be invalid base45, the header check must win.
        for data in &["", "HC1", "hc1:6BFOXN", "HC2:6BFOXN", "~~~~"] {
            match decode(data) {
                Err(DecodeError::InvalidHeader(marker)) => assert_eq!(marker, "HC1:"),
                other => panic!("expected InvalidHeader for {:?}, got {:?}", data, other),
            }
        }
    }

    #[test]
    fn strip_header_returns_remainder() {
        assert_eq!(strip_header("HC1:ABC \n").unwrap(), "ABC");
        assert_eq!(strip_header("HC1:").unwrap(), "");
    }

    #[test]
    fn malformed_base45_fails_at_base45_stage() {
        // ':' is not followed by a full group and '~' is outside the alphabet.
        let err = decode("HC1:~~~").unwrap_err();
        assert!(matches!(err, DecodeError::Base45(_)), "{:?}", err);
    }

    #[test]
    fn corrupt_zlib_fails_at_inflate_stage() {
        // "BB8" is the base45 encoding of "AB", which is not a zlib header.
        let err = decode("HC1:BB8").unwrap_err();
        assert!(matches!(err, DecodeError::Inflate(_)), "{:?}", err);
        // The cause is chained, not repeated in the message.
        assert_eq!(err.to_string(), "zlib inflation failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn non_envelope_fails_at_envelope_stage() {
        let not_cose = serde_cbor::to_vec(&Value::Integer(42)).unwrap();
        let err = decode(&hc1(&not_cose)).unwrap_err();
        assert!(matches!(err, DecodeError::Envelope(_)), "{:?}", err);
    }

    #[test]
    fn non_cbor_payload_fails_at_payload_stage() {
        let envelope = Value::Array(vec![
            Value::Bytes(vec![]),
            Value::Map(BTreeMap::new()),
            Value::Bytes(vec![0xff]),
            Value::Bytes(vec![0; 64]),
        ]);
        let data = hc1(&serde_cbor::to_vec(&envelope).unwrap());
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, DecodeError::Payload(_)), "{:?}", err);
    }

    #[test]
    fn envelope_headers_and_missing_certificate() {
        let mut protected = BTreeMap::new();
        protected.insert(Value::Integer(HEADER_ALG), Value::Integer(-7));
        let mut unprotected = BTreeMap::new();
        unprotected.insert(Value::Integer(HEADER_KID), Value::Bytes(vec![1, 2, 3]));

        let mut claims = BTreeMap::new();
        claims.insert(Value::Integer(CLAIM_ISS), Value::Text("XX".to_string()));

        let envelope = Value::Array(vec![
            Value::Bytes(serde_cbor::to_vec(&Value::Map(protected)).unwrap()),
            Value::Map(unprotected),
            Value::Bytes(serde_cbor::to_vec(&Value::Map(claims)).unwrap()),
            Value::Bytes(vec![0; 64]),
        ]);
        let decoded = decode(&hc1(&serde_cbor::to_vec(&envelope).unwrap())).unwrap();

        assert_eq!(decoded.envelope.algorithm(), Some(-7));
        assert_eq!(decoded.envelope.key_id(), Some(&[1u8, 2, 3][..]));
        assert_eq!(decoded.claims().issuer.as_deref(), Some("XX"));
        assert!(matches!(
            decoded.certificate(),
            Err(DecodeError::MissingCertificate)
        ));
    }
}
