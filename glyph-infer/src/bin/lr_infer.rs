//! Logistic regression backend: prints the top-1 label of `--input`

fn main() -> anyhow::Result<()> {
    glyph_infer::cli::run(glyph_common::BackendKind::Lr)
}
