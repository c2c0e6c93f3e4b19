// Licensed under the Apache-2.0 license

mod pimage_file;

pub use pimage_file::{
    check_sources_exist, decode_image, pimage_create, pimage_decode, DecodedImage,
};
