//! Opening documents protected only by an owner password
//!
//! Such files have an empty user password: any reader may open them, the
//! encryption only carries permission flags. The output is written without
//! encryption.

use lopdf::encryption::{decrypt_object, get_encryption_key, DecryptionError};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Decrypt every string and stream using the empty user password, then drop
/// the `/Encrypt` dictionary.
///
/// Fails without touching the document when a real password is required or
/// the security handler is one lopdf cannot compute keys for.
pub fn decrypt_with_empty_password(doc: &mut Document) -> Result<(), DecryptionError> {
    let encrypt_id = doc
        .trailer
        .get(b"Encrypt")
        .and_then(Object::as_reference)
        .map_err(|_| DecryptionError::MissingEncryptDictionary)?;
    let key = get_encryption_key(doc, "", true)?;

    let handler = doc
        .get_encrypted()
        .map_err(|_| DecryptionError::MissingEncryptDictionary)?;
    let aes = uses_aes(handler);
    let metadata_encrypted = handler
        .get(b"EncryptMetadata")
        .and_then(Object::as_bool)
        .unwrap_or(true);

    for (&id, object) in doc.objects.iter_mut() {
        if id == encrypt_id || is_cross_reference(object) {
            continue;
        }
        if !metadata_encrypted && matches!(object.type_name(), Ok(b"Metadata")) {
            continue;
        }
        decrypt_in_place(&key, id, object, aes)?;
    }

    doc.objects.remove(&encrypt_id);
    doc.trailer.remove(b"Encrypt");
    Ok(())
}

/// Whether the stream crypt filter is AES-128 (`/AESV2`); RC4 otherwise
fn uses_aes(handler: &Dictionary) -> bool {
    let filter = handler
        .get(b"StmF")
        .and_then(Object::as_name)
        .unwrap_or(&b"StdCF"[..]);

    handler
        .get(b"CF")
        .and_then(Object::as_dict)
        .and_then(|filters| filters.get(filter))
        .and_then(Object::as_dict)
        .and_then(|filter| filter.get(b"CFM"))
        .and_then(Object::as_name)
        .map(|method| method == b"AESV2")
        .unwrap_or(false)
}

fn is_cross_reference(object: &Object) -> bool {
    matches!(object.type_name(), Ok(b"XRef"))
}

/// Strings nested in arrays and dictionaries are encrypted with the key of
/// the indirect object that holds them.
fn decrypt_in_place(
    key: &[u8],
    id: ObjectId,
    object: &mut Object,
    aes: bool,
) -> Result<(), DecryptionError> {
    match object {
        Object::String(..) | Object::Stream(_) => {
            let plain = decrypt_object(key, id, &*object, aes)?;
            match object {
                Object::String(bytes, _) => *bytes = plain,
                Object::Stream(stream) => {
                    for (_, value) in stream.dict.iter_mut() {
                        decrypt_in_place(key, id, value, aes)?;
                    }
                    stream.set_content(plain);
                }
                _ => {}
            }
        }
        Object::Array(items) => {
            for item in items {
                decrypt_in_place(key, id, item, aes)?;
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                decrypt_in_place(key, id, value, aes)?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn with_handler(handler: Dictionary) -> Document {
        let mut doc = Document::with_version("1.5");
        let encrypt_id = doc.add_object(handler);
        doc.trailer.set("Encrypt", encrypt_id);
        doc.trailer.set(
            "ID",
            vec![
                Object::string_literal(vec![7u8; 16]),
                Object::string_literal(vec![7u8; 16]),
            ],
        );
        doc
    }

    #[test]
    fn test_wrong_user_password_leaves_document_alone() {
        let mut doc = with_handler(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "O" => Object::string_literal(vec![0x11u8; 32]),
            "U" => Object::string_literal(vec![0x22u8; 32]),
            "P" => -4,
        });
        let secret = doc.add_object(Object::string_literal("ciphertext"));

        let result = decrypt_with_empty_password(&mut doc);

        assert!(matches!(result, Err(DecryptionError::IncorrectPassword)));
        assert!(doc.is_encrypted());
        assert_eq!(
            doc.get_object(secret).and_then(Object::as_str).unwrap(),
            b"ciphertext"
        );
    }

    #[test]
    fn test_unsupported_handler_is_reported() {
        let mut doc = with_handler(dictionary! {
            "Filter" => "Standard",
            "V" => 5,
            "R" => 6,
            "O" => Object::string_literal(vec![0u8; 48]),
            "U" => Object::string_literal(vec![0u8; 48]),
            "P" => -4,
        });
        assert!(matches!(
            decrypt_with_empty_password(&mut doc),
            Err(DecryptionError::UnsupportedEncryption)
        ));
    }

    #[test]
    fn test_crypt_filter_method_selects_aes() {
        let aes = dictionary! {
            "CF" => dictionary! { "StdCF" => dictionary! { "CFM" => "AESV2" } },
            "StmF" => "StdCF",
        };
        let rc4 = dictionary! {
            "CF" => dictionary! { "StdCF" => dictionary! { "CFM" => "V2" } },
        };
        assert!(uses_aes(&aes));
        assert!(!uses_aes(&rc4));
        assert!(!uses_aes(&Dictionary::new()));
    }
}
