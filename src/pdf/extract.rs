//! Lifting image XObjects out of a lopdf document

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::ImageError;

use super::transcode::{ColorSpec, DeviceColor, ImageData, RawImage};

/// Page trees deeper than this are treated as malformed
const MAX_TREE_DEPTH: usize = 64;

/// Follow a reference one level; direct objects are returned as-is
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Resources of a page, inherited from the page tree when the page has none
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Image XObjects a page references directly, in resource dictionary order
pub fn page_images(doc: &Document, page_id: ObjectId) -> Vec<(String, ObjectId)> {
    let Some(xobjects) = page_resources(doc, page_id)
        .and_then(|resources| resources.get(b"XObject").ok())
        .and_then(|xobjects| resolve_dict(doc, xobjects))
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(name, value)| {
            let id = value.as_reference().ok()?;
            let stream = doc.get_object(id).and_then(Object::as_stream).ok()?;
            is_image(stream).then(|| (String::from_utf8_lossy(name).into_owned(), id))
        })
        .collect()
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Image"))
}

/// Read an image XObject into a [`RawImage`] the transcoder understands
pub fn extract_image(doc: &Document, id: ObjectId) -> Result<RawImage, ImageError> {
    let stream = doc
        .get_object(id)
        .and_then(Object::as_stream)
        .map_err(|e| ImageError::Decode(e.to_string()))?;
    let dict = &stream.dict;

    if dict.get(b"ImageMask").and_then(Object::as_bool).unwrap_or(false) {
        return Err(ImageError::Decode("stencil masks carry no color data".to_string()));
    }

    let mask = dict.get(b"Mask").ok().and_then(|mask| resolve(doc, mask));
    if matches!(mask, Some(Object::Array(_))) {
        return Err(ImageError::ColorKeyMask);
    }

    let width = dimension(doc, dict, b"Width")?;
    let height = dimension(doc, dict, b"Height")?;
    let decode = decode_ranges(doc, dict)?;

    let data = match filter_name(dict)?.as_deref() {
        Some(b"DCTDecode") | Some(b"DCT") => {
            if decode.as_deref().is_some_and(|ranges| !is_identity(ranges, 1.0)) {
                return Err(ImageError::UnsupportedDecode(
                    "remapped JPEG samples".to_string(),
                ));
            }
            ImageData::Jpeg(stream.content.clone())
        }
        Some(b"FlateDecode") | Some(b"Fl") => {
            let bytes = stream
                .decompressed_content()
                .map_err(|e| ImageError::Decode(e.to_string()))?;
            raw_pixels(doc, dict, bytes, decode.as_deref())?
        }
        None => raw_pixels(doc, dict, stream.content.clone(), decode.as_deref())?,
        Some(other) => {
            return Err(ImageError::UnsupportedFilter(
                String::from_utf8_lossy(other).into_owned(),
            ))
        }
    };

    Ok(RawImage {
        width,
        height,
        data,
    })
}

fn dimension(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<u32, ImageError> {
    dict.get(key)
        .ok()
        .and_then(|value| resolve(doc, value))
        .and_then(|value| value.as_i64().ok())
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| *value > 0)
        .ok_or_else(|| {
            ImageError::Decode(format!(
                "missing or invalid /{}",
                String::from_utf8_lossy(key)
            ))
        })
}

/// The single filter applied to a stream. Filter chains are not supported.
fn filter_name(dict: &Dictionary) -> Result<Option<Vec<u8>>, ImageError> {
    match dict.get(b"Filter") {
        Err(_) => Ok(None),
        Ok(Object::Name(name)) => Ok(Some(name.clone())),
        Ok(Object::Array(filters)) => match filters.as_slice() {
            [] => Ok(None),
            [Object::Name(name)] => Ok(Some(name.clone())),
            _ => Err(ImageError::UnsupportedFilter("filter chain".to_string())),
        },
        Ok(_) => Err(ImageError::UnsupportedFilter("malformed /Filter".to_string())),
    }
}

fn raw_pixels(
    doc: &Document,
    dict: &Dictionary,
    bytes: Vec<u8>,
    decode: Option<&[(f32, f32)]>,
) -> Result<ImageData, ImageError> {
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8);
    if bits != 8 {
        return Err(ImageError::UnsupportedBitDepth(bits));
    }

    let color = match dict.get(b"ColorSpace") {
        Ok(space) => color_spec(doc, space)?,
        Err(_) => {
            return Err(ImageError::UnsupportedColorSpace(
                "no /ColorSpace".to_string(),
            ))
        }
    };

    let bytes = match (&color, decode) {
        (_, None) => bytes,
        (ColorSpec::Device(device), Some(ranges)) => apply_decode(*device, ranges, bytes)?,
        (ColorSpec::Indexed { .. }, Some(ranges)) if is_identity(ranges, 255.0) => bytes,
        (ColorSpec::Indexed { .. }, Some(_)) => {
            return Err(ImageError::UnsupportedDecode(
                "remapped palette indices".to_string(),
            ))
        }
    };

    Ok(ImageData::Pixels { color, bytes })
}

/// `/Decode` as one (min, max) pair per color component
fn decode_ranges(doc: &Document, dict: &Dictionary) -> Result<Option<Vec<(f32, f32)>>, ImageError> {
    let Ok(decode) = dict.get(b"Decode") else {
        return Ok(None);
    };

    let values = resolve(doc, decode)
        .and_then(|decode| decode.as_array().ok())
        .ok_or_else(|| ImageError::UnsupportedDecode("not an array".to_string()))?
        .iter()
        .map(|value| {
            value
                .as_float()
                .map_err(|_| ImageError::UnsupportedDecode("non-numeric entry".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() % 2 != 0 {
        return Err(ImageError::UnsupportedDecode(
            "odd number of entries".to_string(),
        ));
    }

    Ok(Some(values.chunks(2).map(|pair| (pair[0], pair[1])).collect()))
}

fn is_identity(ranges: &[(f32, f32)], max: f32) -> bool {
    ranges
        .iter()
        .all(|&(low, high)| low.abs() < f32::EPSILON && (high - max).abs() < f32::EPSILON)
}

/// Bake a `/Decode` mapping into the samples; the replacement carries none
fn apply_decode(
    color: DeviceColor,
    ranges: &[(f32, f32)],
    mut bytes: Vec<u8>,
) -> Result<Vec<u8>, ImageError> {
    let components = color.components();
    if ranges.len() != components {
        return Err(ImageError::UnsupportedDecode(format!(
            "expected {} ranges, found {}",
            components,
            ranges.len()
        )));
    }
    if is_identity(ranges, 1.0) {
        return Ok(bytes);
    }

    let tables: Vec<[u8; 256]> = ranges
        .iter()
        .map(|&(low, high)| {
            let mut table = [0u8; 256];
            for (sample, entry) in table.iter_mut().enumerate() {
                let value = low + sample as f32 / 255.0 * (high - low);
                *entry = (value * 255.0).round().clamp(0.0, 255.0) as u8;
            }
            table
        })
        .collect();

    for (index, byte) in bytes.iter_mut().enumerate() {
        *byte = tables[index % components][*byte as usize];
    }
    Ok(bytes)
}

fn color_spec(doc: &Document, space: &Object) -> Result<ColorSpec, ImageError> {
    let space = resolve(doc, space)
        .ok_or_else(|| ImageError::UnsupportedColorSpace("dangling reference".to_string()))?;

    match space {
        Object::Name(name) => device_color(name).map(ColorSpec::Device),
        Object::Array(items) => {
            let family = items
                .first()
                .and_then(|family| family.as_name().ok())
                .ok_or_else(|| ImageError::UnsupportedColorSpace("empty array".to_string()))?;
            match family {
                b"ICCBased" => icc_components(doc, items.get(1)).map(ColorSpec::Device),
                b"CalRGB" => Ok(ColorSpec::Device(DeviceColor::Rgb)),
                b"CalGray" => Ok(ColorSpec::Device(DeviceColor::Gray)),
                b"Indexed" | b"I" => indexed(doc, items),
                other => Err(unsupported(other)),
            }
        }
        _ => Err(ImageError::UnsupportedColorSpace("malformed".to_string())),
    }
}

fn device_color(name: &[u8]) -> Result<DeviceColor, ImageError> {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => Ok(DeviceColor::Gray),
        b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(DeviceColor::Rgb),
        b"DeviceCMYK" | b"CMYK" => Ok(DeviceColor::Cmyk),
        other => Err(unsupported(other)),
    }
}

fn unsupported(name: &[u8]) -> ImageError {
    ImageError::UnsupportedColorSpace(String::from_utf8_lossy(name).into_owned())
}

/// ICC profiles are ignored; only their component count matters here
fn icc_components(doc: &Document, profile: Option<&Object>) -> Result<DeviceColor, ImageError> {
    let stream = profile
        .and_then(|profile| resolve(doc, profile))
        .and_then(|profile| profile.as_stream().ok())
        .ok_or_else(|| ImageError::UnsupportedColorSpace("ICCBased without profile".to_string()))?;

    match stream.dict.get(b"N").and_then(Object::as_i64) {
        Ok(1) => Ok(DeviceColor::Gray),
        Ok(3) => Ok(DeviceColor::Rgb),
        Ok(4) => Ok(DeviceColor::Cmyk),
        _ => Err(ImageError::UnsupportedColorSpace(
            "ICCBased with unexpected /N".to_string(),
        )),
    }
}

/// `[/Indexed base hival lookup]`
fn indexed(doc: &Document, items: &[Object]) -> Result<ColorSpec, ImageError> {
    let [_, base, _, lookup] = items else {
        return Err(ImageError::UnsupportedColorSpace(
            "malformed Indexed".to_string(),
        ));
    };

    let base = match color_spec(doc, base)? {
        ColorSpec::Device(device) => device,
        ColorSpec::Indexed { .. } => {
            return Err(ImageError::UnsupportedColorSpace(
                "nested Indexed".to_string(),
            ))
        }
    };

    let palette = match resolve(doc, lookup) {
        Some(Object::String(bytes, _)) => bytes.clone(),
        Some(Object::Stream(stream)) if stream.dict.has(b"Filter") => stream
            .decompressed_content()
            .map_err(|e| ImageError::Decode(e.to_string()))?,
        Some(Object::Stream(stream)) => stream.content.clone(),
        _ => {
            return Err(ImageError::UnsupportedColorSpace(
                "Indexed without lookup table".to_string(),
            ))
        }
    };

    Ok(ColorSpec::Indexed { base, palette })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn doc_with_image(dict: Dictionary, content: Vec<u8>) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let id = doc.add_object(Stream::new(dict, content));
        (doc, id)
    }

    fn image_dict() -> Dictionary {
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 1,
            "BitsPerComponent" => 8,
            "ColorSpace" => "DeviceRGB",
        }
    }

    #[test]
    fn test_extract_unfiltered_rgb() {
        let (doc, id) = doc_with_image(image_dict(), vec![1, 2, 3, 4, 5, 6]);
        let raw = extract_image(&doc, id).unwrap();
        assert_eq!((raw.width, raw.height), (2, 1));
        match raw.data {
            ImageData::Pixels { color, bytes } => {
                assert_eq!(color, ColorSpec::Device(DeviceColor::Rgb));
                assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6]);
            }
            ImageData::Jpeg(_) => panic!("expected raw pixels"),
        }
    }

    #[test]
    fn test_extract_jpeg_keeps_bytes() {
        let mut dict = image_dict();
        dict.set("Filter", "DCTDecode");
        let (doc, id) = doc_with_image(dict, b"jpeg bytes".to_vec());
        let raw = extract_image(&doc, id).unwrap();
        assert!(matches!(raw.data, ImageData::Jpeg(ref bytes) if bytes == b"jpeg bytes"));
    }

    #[test]
    fn test_extract_rejects_stencil_mask() {
        let mut dict = image_dict();
        dict.set("ImageMask", true);
        let (doc, id) = doc_with_image(dict, vec![0]);
        assert!(matches!(extract_image(&doc, id), Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_extract_rejects_unsupported_filter() {
        let mut dict = image_dict();
        dict.set("Filter", "JBIG2Decode");
        let (doc, id) = doc_with_image(dict, vec![0]);
        assert_eq!(
            extract_image(&doc, id).unwrap_err(),
            ImageError::UnsupportedFilter("JBIG2Decode".to_string())
        );
    }

    #[test]
    fn test_extract_rejects_low_bit_depth() {
        let mut dict = image_dict();
        dict.set("BitsPerComponent", 1);
        let (doc, id) = doc_with_image(dict, vec![0]);
        assert_eq!(
            extract_image(&doc, id).unwrap_err(),
            ImageError::UnsupportedBitDepth(1)
        );
    }

    #[test]
    fn test_extract_indexed_with_string_palette() {
        let mut dict = image_dict();
        dict.set(
            "ColorSpace",
            vec![
                Object::Name(b"Indexed".to_vec()),
                Object::Name(b"DeviceRGB".to_vec()),
                1.into(),
                Object::string_literal(vec![255u8, 0, 0, 0, 255, 0]),
            ],
        );
        let (doc, id) = doc_with_image(dict, vec![0, 1]);
        let raw = extract_image(&doc, id).unwrap();
        match raw.data {
            ImageData::Pixels {
                color: ColorSpec::Indexed { base, palette },
                ..
            } => {
                assert_eq!(base, DeviceColor::Rgb);
                assert_eq!(palette, vec![255, 0, 0, 0, 255, 0]);
            }
            other => panic!("unexpected image data: {:?}", other),
        }
    }

    #[test]
    fn test_extract_icc_based_uses_component_count() {
        let mut doc = Document::with_version("1.5");
        let profile = doc.add_object(Stream::new(dictionary! { "N" => 1 }, vec![]));
        let mut dict = image_dict();
        dict.set(
            "ColorSpace",
            vec![Object::Name(b"ICCBased".to_vec()), profile.into()],
        );
        let id = doc.add_object(Stream::new(dict, vec![9, 9]));
        match extract_image(&doc, id).unwrap().data {
            ImageData::Pixels { color, .. } => {
                assert_eq!(color, ColorSpec::Device(DeviceColor::Gray))
            }
            ImageData::Jpeg(_) => panic!("expected raw pixels"),
        }
    }

    #[test]
    fn test_extract_applies_inverting_decode() {
        let mut dict = image_dict();
        dict.set("ColorSpace", "DeviceGray");
        dict.set("Decode", vec![1.into(), 0.into()]);
        let (doc, id) = doc_with_image(dict, vec![0, 255]);
        match extract_image(&doc, id).unwrap().data {
            ImageData::Pixels { bytes, .. } => assert_eq!(bytes, vec![255, 0]),
            ImageData::Jpeg(_) => panic!("expected raw pixels"),
        }
    }

    #[test]
    fn test_extract_applies_decode_per_component() {
        let mut dict = image_dict();
        dict.set(
            "Decode",
            vec![
                0.into(),
                1.into(),
                1.into(),
                0.into(),
                Object::Real(0.0),
                Object::Real(0.5),
            ],
        );
        let (doc, id) = doc_with_image(dict, vec![10, 10, 255, 200, 0, 0]);
        match extract_image(&doc, id).unwrap().data {
            ImageData::Pixels { bytes, .. } => assert_eq!(bytes, vec![10, 245, 128, 200, 255, 0]),
            ImageData::Jpeg(_) => panic!("expected raw pixels"),
        }
    }

    #[test]
    fn test_extract_default_decode_is_a_no_op() {
        let mut dict = image_dict();
        dict.set(
            "Decode",
            vec![0.into(), 1.into(), 0.into(), 1.into(), 0.into(), 1.into()],
        );
        let (doc, id) = doc_with_image(dict, vec![1, 2, 3, 4, 5, 6]);
        match extract_image(&doc, id).unwrap().data {
            ImageData::Pixels { bytes, .. } => assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6]),
            ImageData::Jpeg(_) => panic!("expected raw pixels"),
        }
    }

    #[test]
    fn test_extract_rejects_remapped_jpeg() {
        let mut dict = image_dict();
        dict.set("Filter", "DCTDecode");
        dict.set(
            "Decode",
            vec![1.into(), 0.into(), 1.into(), 0.into(), 1.into(), 0.into()],
        );
        let (doc, id) = doc_with_image(dict, b"jpeg bytes".to_vec());
        assert!(matches!(
            extract_image(&doc, id),
            Err(ImageError::UnsupportedDecode(_))
        ));
    }

    #[test]
    fn test_extract_rejects_decode_of_wrong_length() {
        let mut dict = image_dict();
        dict.set("Decode", vec![1.into(), 0.into()]);
        let (doc, id) = doc_with_image(dict, vec![0; 6]);
        assert!(matches!(
            extract_image(&doc, id),
            Err(ImageError::UnsupportedDecode(_))
        ));
    }

    #[test]
    fn test_extract_rejects_color_key_mask() {
        let mut dict = image_dict();
        dict.set("ColorSpace", "DeviceGray");
        dict.set("Mask", vec![0.into(), 10.into()]);
        let (doc, id) = doc_with_image(dict, vec![0, 0]);
        assert_eq!(extract_image(&doc, id).unwrap_err(), ImageError::ColorKeyMask);
    }

    #[test]
    fn test_extract_accepts_soft_mask_reference() {
        let mut dict = image_dict();
        dict.set("Mask", Object::Reference((42, 0)));
        let (doc, id) = doc_with_image(dict, vec![0; 6]);
        assert!(extract_image(&doc, id).is_ok());
    }

    #[test]
    fn test_page_resources_are_inherited() {
        let mut doc = Document::with_version("1.5");
        let image = doc.add_object(Stream::new(image_dict(), vec![0; 6]));
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image },
                },
            }),
        );

        assert_eq!(page_images(&doc, page_id), vec![("Im0".to_string(), image)]);
    }

    #[test]
    fn test_page_images_ignores_form_xobjects() {
        let mut doc = Document::with_version("1.5");
        let form = doc.add_object(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Form" },
            vec![],
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Fm0" => form },
            },
        });
        assert!(page_images(&doc, page_id).is_empty());
    }
}
