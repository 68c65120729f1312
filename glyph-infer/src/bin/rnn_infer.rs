//! RNN backend: prints the best label of `--input`, or "a or b?" when the
//! two best classes are close

fn main() -> anyhow::Result<()> {
    glyph_infer::cli::run(glyph_common::BackendKind::Rnn)
}
