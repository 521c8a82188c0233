use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::error::Error;
use std::io;

#[macro_export]
macro_rules! assert_epsilon {
    ($x:expr, $y:expr) => {
        let x = $x; // Make sure we evaluate only once
        let y = $y;
        if !(x - y < 0.000005 && y - x < 0.000005) {
            println!("Expectation: {}, Got: {}", y, x);
            panic!();
        }
    };
}

// Weight arrays are stored as a u64 length followed by little endian f32s
pub fn write_weights_to_buf(
    weights: &[f32],
    output_bufwriter: &mut dyn io::Write,
) -> Result<(), Box<dyn Error>> {
    if weights.is_empty() {
        return Err("Writing weights of unallocated weights buffer".to_string())?;
    }
    output_bufwriter.write_u64::<LittleEndian>(weights.len() as u64)?;
    for w in weights {
        output_bufwriter.write_f32::<LittleEndian>(*w)?;
    }
    Ok(())
}

pub fn read_weights_from_buf(
    weights: &mut [f32],
    input_bufreader: &mut dyn io::Read,
) -> Result<(), Box<dyn Error>> {
    if weights.is_empty() {
        return Err("Loading weights to unallocated weighs buffer".to_string())?;
    }
    let len = input_bufreader.read_u64::<LittleEndian>()? as usize;
    if len != weights.len() {
        return Err(format!(
            "read_weights_from_buf - number of weights to read ({}) and number of weights allocated ({}) isn't the same",
            len,
            weights.len()
        ))?;
    }
    input_bufreader.read_f32_into::<LittleEndian>(weights)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_weights_buf() {
        let weights = vec![0.5, -1.25, 3.0];
        let mut buf: Vec<u8> = Vec::new();
        write_weights_to_buf(&weights, &mut buf).unwrap();
        assert_eq!(buf.len(), 8 + 3 * 4);

        let mut loaded = vec![0.0; 3];
        read_weights_from_buf(&mut loaded, &mut Cursor::new(&buf)).unwrap();
        assert_eq!(loaded, weights);

        let mut wrong = vec![0.0; 4];
        assert!(read_weights_from_buf(&mut wrong, &mut Cursor::new(&buf)).is_err());
        let mut empty: Vec<f32> = Vec::new();
        assert!(write_weights_to_buf(&empty, &mut buf).is_err());
        assert!(read_weights_from_buf(&mut empty, &mut Cursor::new(&buf)).is_err());
    }
}
