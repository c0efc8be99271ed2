use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use forkscout::{
    corpus::{split_input, Document, Pattern},
    search::{MatchMode, SearchOptions, Searcher},
};
use std::fs;
use tempfile::tempdir;

const PHRASES: &[&str] = &[
    "to be", "the king", "queen", "ghost", "night", "sword", "crown", "poison", "madness",
    "castle", "revenge", "absent phrase",
];

fn create_corpus(document_count: usize, lines_per_document: usize) -> Vec<Document> {
    (0..document_count)
        .map(|i| {
            let mut raw = format!("Scene {}\n", i);
            for j in 0..lines_per_document {
                raw.push_str(&format!(
                    "Line {} the king {} calls the queen; to be or not to be, the ghost walks the night {}\n",
                    j, i, j
                ));
                if j % 7 == 0 {
                    raw.push_str("a poisoned sword, a stolen crown, madness in the castle\n");
                }
            }
            Document::parse(&raw)
        })
        .collect()
}

fn patterns() -> Vec<Pattern> {
    PHRASES.iter().map(|p| Pattern::from(*p)).collect()
}

fn bench_sequential_vs_parallel(c: &mut Criterion) {
    let patterns = patterns();
    let sequential = Searcher::new(SearchOptions::sequential()).unwrap();
    let parallel = Searcher::new(SearchOptions::parallel()).unwrap();
    let fine_grained = Searcher::new(
        SearchOptions::parallel()
            .with_min_split_size(4)
            .with_phrase_min_split_size(3),
    )
    .unwrap();

    let mut group = c.benchmark_group("Corpus Scaling");
    for document_count in [8, 64, 256] {
        let documents = create_corpus(document_count, 50);
        for (name, searcher) in [
            ("sequential", &sequential),
            ("parallel", &parallel),
            ("fine_grained", &fine_grained),
        ] {
            group.bench_with_input(
                BenchmarkId::new(name, document_count),
                &documents,
                |b, documents| b.iter(|| black_box(searcher.search(documents, &patterns).unwrap())),
            );
        }
    }
    group.finish();
}

fn bench_match_modes(c: &mut Criterion) {
    let documents = create_corpus(64, 50);
    let patterns = patterns();

    let mut group = c.benchmark_group("Match Mode");
    for mode in [MatchMode::Literal, MatchMode::Phrase] {
        let searcher = Searcher::new(SearchOptions::parallel().with_match_mode(mode)).unwrap();
        group.bench_function(format!("{:?}", mode).to_lowercase(), |b| {
            b.iter(|| black_box(searcher.search(&documents, &patterns).unwrap()))
        });
    }
    group.finish();
}

fn bench_loaded_corpus(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("works.txt");
    let raw: Vec<String> = (0..128)
        .map(|i| format!("Act {}\nthe king and the queen walk the castle at night {}\n", i, i))
        .collect();
    fs::write(&path, raw.join("@")).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    let patterns = patterns();

    let mut group = c.benchmark_group("Split And Search");
    for threads in [1, 2, 4] {
        let searcher = Searcher::new(
            SearchOptions::parallel()
                .with_threads(threads)
                .with_min_split_size(8),
        )
        .unwrap();
        group.bench_function(format!("threads_{}", threads), |b| {
            b.iter(|| {
                let documents = split_input(&text, "@");
                black_box(searcher.search(&documents, &patterns).unwrap())
            })
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_sequential_vs_parallel, bench_match_modes, bench_loaded_corpus
}
criterion_main!(benches);
