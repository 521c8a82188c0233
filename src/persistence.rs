use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::error::Error;
use std::fs;
use std::io;
use std::io::Read;

use crate::model_instance;
use crate::regressor::Regressor;

const REGRESSOR_HEADER_MAGIC_STRING: &[u8; 4] = b"FWFM"; // Factorization Weights For Models
const REGRESSOR_HEADER_VERSION: u32 = 1;

impl model_instance::ModelInstance {
    pub fn save_to_buf(&self, output_bufwriter: &mut dyn io::Write) -> Result<(), Box<dyn Error>> {
        let serialized = serde_json::to_vec_pretty(&self)?;
        output_bufwriter.write_u64::<LittleEndian>(serialized.len() as u64)?;
        output_bufwriter.write_all(&serialized)?;
        Ok(())
    }

    pub fn new_from_buf(input_bufreader: &mut dyn io::Read) -> Result<model_instance::ModelInstance, Box<dyn Error>> {
        let len = input_bufreader.read_u64::<LittleEndian>()?;
        let mi: model_instance::ModelInstance = serde_json::from_reader(input_bufreader.take(len))?;
        Ok(mi)
    }
}

pub fn save_regressor_to_filename(
    filename: &str,
    mi: &model_instance::ModelInstance,
    re: &Regressor,
) -> Result<(), Box<dyn Error>> {
    let output_bufwriter = &mut io::BufWriter::new(fs::File::create(filename)?);
    write_regressor_header(output_bufwriter)?;
    mi.save_to_buf(output_bufwriter)?;
    re.write_weights_to_buf(output_bufwriter)?;
    io::Write::flush(output_bufwriter)?;
    log::info!("Saved {} weights to {}", re.weights.len(), filename);
    Ok(())
}

fn write_regressor_header(output_bufwriter: &mut dyn io::Write) -> Result<(), Box<dyn Error>> {
    // we will write magic string FWFM
    // And then 32 bit unsigned version of the regressor
    output_bufwriter.write_all(REGRESSOR_HEADER_MAGIC_STRING)?;
    output_bufwriter.write_u32::<LittleEndian>(REGRESSOR_HEADER_VERSION)?;
    Ok(())
}

fn verify_header(input_bufreader: &mut dyn io::Read) -> Result<(), Box<dyn Error>> {
    let mut magic_string: [u8; 4] = [0; 4];
    input_bufreader.read_exact(&mut magic_string)?;
    if &magic_string != REGRESSOR_HEADER_MAGIC_STRING {
        return Err("Regressor header does not begin with magic bytes FWFM")?;
    }

    let version = input_bufreader.read_u32::<LittleEndian>()?;
    if REGRESSOR_HEADER_VERSION != version {
        return Err(format!(
            "Regressor file version of this binary: {}, version of the regressor file: {}",
            REGRESSOR_HEADER_VERSION, version
        ))?;
    }
    Ok(())
}

pub fn new_regressor_from_buf(
    input_bufreader: &mut dyn io::Read,
) -> Result<(model_instance::ModelInstance, Regressor), Box<dyn Error>> {
    verify_header(input_bufreader)?;
    let mi = model_instance::ModelInstance::new_from_buf(input_bufreader)?;
    // Optimizer state is not stored, the updater starts from a clean cache
    let mut re = Regressor::new(&mi)?;
    re.overwrite_weights_from_buf(input_bufreader)?;
    Ok((mi, re))
}

pub fn new_regressor_from_filename(
    filename: &str,
) -> Result<(model_instance::ModelInstance, Regressor), Box<dyn Error>> {
    let mut input_bufreader = io::BufReader::new(fs::File::open(filename)?);
    let (mi, re) = new_regressor_from_buf(&mut input_bufreader)?;
    log::info!("Loaded {} from {}", re.get_name(), filename);
    Ok((mi, re))
}

#[cfg(test)]
mod tests {
    // Note this useful idiom: importing names from outer (for mod tests) scope.
    use super::*;
    use crate::feature_buffer::SparseRow;
    use crate::optimizer::Optimizer;
    use crate::score::ScoreFunction;
    use tempfile::tempdir;

    fn ffm_mi() -> model_instance::ModelInstance {
        let mut mi = model_instance::ModelInstance::new_empty().unwrap();
        mi.score_function = ScoreFunction::FFM;
        mi.optimizer = Optimizer::AdaGrad;
        mi.num_feature = 5;
        mi.num_field = 3;
        mi.num_factor = 8;
        mi.learning_rate = 0.1;
        mi.seed = 42;
        mi
    }

    fn ffm_row() -> SparseRow {
        let mut row = SparseRow::new(1.0);
        row.add_field_feature(1, 1.0, 0);
        row.add_field_feature(2, 0.5, 1);
        row.add_field_feature(4, 1.0, 2);
        row
    }

    #[test]
    fn save_load_and_predict_ffm() {
        let mi = ffm_mi();
        let mut re = Regressor::new(&mi).unwrap();
        let row = ffm_row();
        for _ in 0..3 {
            re.learn(&row, true).unwrap();
        }
        let before = re.predict(&row).unwrap();

        let dir = tempdir().unwrap();
        let regressor_filepath = dir.path().join("test_regressor.fwfm");
        let path = regressor_filepath.to_str().unwrap();
        save_regressor_to_filename(path, &mi, &re).unwrap();

        let (mi2, re2) = new_regressor_from_filename(path).unwrap();
        assert_eq!(mi2, mi);
        assert_eq!(re2.weights, re.weights);
        assert_eq!(re2.predict(&row).unwrap(), before);
    }

    #[test]
    fn reject_foreign_and_truncated_files() {
        let mut bad_magic = std::io::Cursor::new(b"FWRE\x01\x00\x00\x00".to_vec());
        assert!(new_regressor_from_buf(&mut bad_magic).is_err());

        let mut bad_version = std::io::Cursor::new(b"FWFM\x63\x00\x00\x00".to_vec());
        let err = new_regressor_from_buf(&mut bad_version).err().unwrap();
        assert!(err.to_string().contains("version"));

        let mi = ffm_mi();
        let re = Regressor::new(&mi).unwrap();
        let mut buf: Vec<u8> = Vec::new();
        write_regressor_header(&mut buf).unwrap();
        mi.save_to_buf(&mut buf).unwrap();
        re.write_weights_to_buf(&mut buf).unwrap();
        buf.truncate(buf.len() - 4);
        let mut truncated = std::io::Cursor::new(buf);
        assert!(new_regressor_from_buf(&mut truncated).is_err());
    }
}
