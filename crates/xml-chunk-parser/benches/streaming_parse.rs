use xml_chunk_parser::{Options, Parser};

fn main() {
    divan::main();
}

/// Builds a synthetic document with `n` sibling elements, each carrying one
/// attribute and a short text run, so the bench reads no external fixture.
fn synthetic_document(n: usize) -> String {
    let mut doc = String::from("<root>");
    for i in 0..n {
        doc.push_str(&format!(r#"<item id="{i}">value {i}</item>"#));
    }
    doc.push_str("</root>");
    doc
}

#[divan::bench]
fn bench_single_chunk(bencher: divan::Bencher) {
    let input = synthetic_document(2000);

    bencher.bench(|| {
        let mut parser = Parser::default();
        parser.parse_stream(input.as_str()).unwrap();
        parser.parse_stream(None).unwrap()
    });
}

#[divan::bench]
fn bench_many_small_chunks(bencher: divan::Bencher) {
    let input = synthetic_document(2000);

    bencher.bench(|| {
        let mut parser = Parser::default();
        for chunk in input.as_bytes().chunks(32) {
            let s = std::str::from_utf8(chunk).unwrap();
            parser.parse_stream(s).unwrap();
        }
        parser.parse_stream(None).unwrap()
    });
}

#[divan::bench]
fn bench_stop_node_heavy_document(bencher: divan::Bencher) {
    let mut input = String::from("<root>");
    for i in 0..500 {
        input.push_str(&format!(
            "<script>if (a < {i} && b > {i}) {{ run(); }}</script>"
        ));
    }
    input.push_str("</root>");
    let opts = Options::default().with_stop_nodes(["script"]);

    bencher.bench(|| {
        let mut parser = Parser::new(opts.clone());
        parser.parse_stream(input.as_str()).unwrap();
        parser.parse_stream(None).unwrap()
    });
}
