use serde::{Deserialize, Serialize};

/// Per-frame draw counters reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawMetrics {
    pub clear_count: u64,
    pub draw_count: u64,
    pub pixel_shader_count: u64,
    pub vertex_shader_count: u64,
    pub primitive_count: u64,
    pub sprite_count: u64,
    pub target_count: u64,
    pub texture_count: u64,
}

impl DrawMetrics {
    /// Count a shader program switch (one vertex and one pixel shader).
    pub fn record_shader_switch(&mut self) {
        self.vertex_shader_count += 1;
        self.pixel_shader_count += 1;
    }

    /// Count one draw call covering `sprites` quads on a freshly bound texture.
    pub fn record_sprite_draw(&mut self, sprites: u64) {
        self.draw_count += 1;
        self.texture_count += 1;
        self.sprite_count += sprites;
        self.primitive_count += sprites * 2;
    }
}

impl std::fmt::Display for DrawMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ClearCount:{}, DrawCount:{}, PixelShaderCount:{}, VertexShaderCount:{}, PrimitiveCount:{}, SpriteCount:{}, TargetCount:{}, TextureCount:{}",
            self.clear_count,
            self.draw_count,
            self.pixel_shader_count,
            self.vertex_shader_count,
            self.primitive_count,
            self.sprite_count,
            self.target_count,
            self.texture_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_draw_counts_two_triangles_per_quad() {
        let mut m = DrawMetrics::default();
        m.record_sprite_draw(3);
        assert_eq!(m.draw_count, 1);
        assert_eq!(m.sprite_count, 3);
        assert_eq!(m.primitive_count, 6);
    }

    #[test]
    fn display_lists_every_counter() {
        let m = DrawMetrics {
            clear_count: 1,
            target_count: 7,
            ..DrawMetrics::default()
        };
        let s = m.to_string();
        assert!(s.starts_with("ClearCount:1, DrawCount:0"));
        assert!(s.contains("VertexShaderCount:0"));
        assert!(s.ends_with("TargetCount:7, TextureCount:0"));
    }
}
