//! Save textures to `.dds` files.

use std::io::Write as _;

use color_eyre::Result;

impl super::Texture {
    /// Write a `.dds` file.
    pub fn write(&self, path: &std::path::Path) -> Result<()> {
        tracing::info!("Writing texture to: {}", path.display());
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.raw_header)?;
        file.write_all(&self.data)?;
        file.write_all(&self.trailing)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    #[test]
    fn untouched_texture_is_identical() {
        let directory = tempfile::tempdir().unwrap();
        let original = directory.path().join("original.dds");
        let copy = directory.path().join("copy.dds");

        let mut texture = crate::dds::header::test::uniform_rgba16(2, 2, [0.1, 0.2, 0.3, 1.0]);
        texture.trailing = vec![7; 8];
        texture.write(&original).unwrap();

        crate::dds::Texture::read(&original)
            .unwrap()
            .write(&copy)
            .unwrap();

        assert_eq!(
            std::fs::read(&original).unwrap(),
            std::fs::read(&copy).unwrap()
        );
    }
}
