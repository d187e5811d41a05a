//! Sample knowledge for fresh installations.

use tracing::info;

use sage_core::error::SageError;
use sage_core::types::NewKnowledgeEntry;

use crate::knowledge::KnowledgeStore;

/// The built-in AI primer entries.
pub fn sample_entries() -> Vec<NewKnowledgeEntry> {
    vec![
        NewKnowledgeEntry::new(
            "Machine Learning Fundamentals",
            "Machine learning is a subset of artificial intelligence that enables computers to \
             learn and make decisions without being explicitly programmed. It uses algorithms to \
             identify patterns in data and make predictions or decisions based on those patterns. \
             The three main types of machine learning are supervised learning, unsupervised \
             learning, and reinforcement learning.",
        )
        .with_category("Machine Learning")
        .with_tags([
            "machine learning",
            "AI",
            "algorithms",
            "supervised learning",
            "unsupervised learning",
            "reinforcement learning",
        ]),
        NewKnowledgeEntry::new(
            "Neural Networks and Deep Learning",
            "Neural networks are computing systems inspired by biological neural networks. They \
             consist of interconnected nodes (neurons) that process information. Deep learning \
             uses multiple layers of neural networks to learn complex patterns. Popular \
             architectures include Convolutional Neural Networks (CNNs) for image processing and \
             Recurrent Neural Networks (RNNs) for sequential data.",
        )
        .with_category("Deep Learning")
        .with_tags([
            "neural networks",
            "deep learning",
            "CNN",
            "RNN",
            "artificial neural networks",
            "layers",
        ]),
        NewKnowledgeEntry::new(
            "Natural Language Processing (NLP)",
            "NLP is a branch of AI that focuses on the interaction between computers and human \
             language. It enables machines to understand, interpret, and generate human language. \
             Key applications include machine translation, sentiment analysis, chatbots, and text \
             summarization. Modern NLP heavily relies on transformer models like BERT and GPT.",
        )
        .with_category("NLP")
        .with_tags([
            "NLP",
            "natural language processing",
            "BERT",
            "GPT",
            "transformer",
            "language models",
        ]),
        NewKnowledgeEntry::new(
            "Computer Vision",
            "Computer vision is a field of AI that enables computers to interpret and understand \
             visual information from the world. It involves tasks like image classification, \
             object detection, facial recognition, and image segmentation. Deep learning models, \
             particularly CNNs, have revolutionized computer vision applications.",
        )
        .with_category("Computer Vision")
        .with_tags([
            "computer vision",
            "image processing",
            "object detection",
            "facial recognition",
            "CNN",
            "image classification",
        ]),
        NewKnowledgeEntry::new(
            "AI Ethics and Responsible AI",
            "AI ethics involves ensuring that artificial intelligence systems are developed and \
             deployed responsibly. Key concerns include bias and fairness, transparency, privacy, \
             accountability, and safety. Organizations should implement ethical guidelines and \
             frameworks to ensure AI systems benefit society while minimizing potential harms.",
        )
        .with_category("AI Ethics")
        .with_tags([
            "AI ethics",
            "responsible AI",
            "bias",
            "fairness",
            "transparency",
            "privacy",
            "accountability",
        ]),
        NewKnowledgeEntry::new(
            "Reinforcement Learning",
            "Reinforcement learning is a type of machine learning where an agent learns to make \
             decisions by taking actions in an environment to maximize cumulative rewards. The \
             agent learns through trial and error, receiving feedback in the form of rewards or \
             penalties. Applications include game playing, robotics, and autonomous systems.",
        )
        .with_category("Reinforcement Learning")
        .with_tags([
            "reinforcement learning",
            "RL",
            "agent",
            "environment",
            "rewards",
            "Q-learning",
            "policy gradient",
        ]),
        NewKnowledgeEntry::new(
            "Large Language Models (LLMs)",
            "Large Language Models are AI models trained on vast amounts of text data to \
             understand and generate human language. Models like GPT, BERT, and LLaMA have \
             demonstrated remarkable capabilities in text generation, translation, and \
             understanding. They use transformer architecture and require significant \
             computational resources for training.",
        )
        .with_category("Language Models")
        .with_tags([
            "LLM",
            "large language models",
            "GPT",
            "BERT",
            "LLaMA",
            "transformer",
            "text generation",
        ]),
        NewKnowledgeEntry::new(
            "AI in Healthcare",
            "AI is transforming healthcare through applications like medical image analysis, drug \
             discovery, personalized medicine, and predictive analytics. Machine learning \
             algorithms can analyze medical images to detect diseases, predict patient outcomes, \
             and assist in diagnosis. However, healthcare AI must meet strict regulatory \
             requirements and ensure patient privacy.",
        )
        .with_category("AI Applications")
        .with_tags([
            "AI healthcare",
            "medical AI",
            "drug discovery",
            "medical imaging",
            "personalized medicine",
            "predictive analytics",
        ]),
        NewKnowledgeEntry::new(
            "AI Safety and Alignment",
            "AI safety focuses on ensuring that AI systems behave as intended and don't cause \
             unintended harm. AI alignment aims to make AI systems' goals and values align with \
             human values. Key challenges include value alignment, robustness, and \
             interpretability. Research in this area is crucial for the safe development of \
             advanced AI systems.",
        )
        .with_category("AI Safety")
        .with_tags([
            "AI safety",
            "AI alignment",
            "value alignment",
            "robustness",
            "interpretability",
            "control",
        ]),
        NewKnowledgeEntry::new(
            "Edge AI and IoT",
            "Edge AI refers to running AI algorithms on edge devices (like smartphones, IoT \
             devices) rather than in the cloud. This approach reduces latency, improves privacy, \
             and works offline. Applications include smart cameras, wearable devices, and \
             autonomous vehicles. Edge AI requires optimized models that can run efficiently on \
             resource-constrained devices.",
        )
        .with_category("Edge Computing")
        .with_tags([
            "edge AI",
            "IoT",
            "edge computing",
            "smart devices",
            "latency",
            "privacy",
            "autonomous vehicles",
        ]),
    ]
}

/// Add the sample entries if the store holds no knowledge yet.
///
/// Returns how many entries were added (zero when the store was not empty).
pub fn seed_if_empty(store: &dyn KnowledgeStore) -> Result<usize, SageError> {
    if store.count()? > 0 {
        return Ok(0);
    }

    let mut added = 0;
    for entry in sample_entries() {
        store.add(entry)?;
        added += 1;
    }
    info!(added, "Seeded sample knowledge");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::Database;
    use crate::knowledge::SqliteKnowledgeStore;

    #[test]
    fn test_sample_entries_are_valid() {
        let entries = sample_entries();
        assert_eq!(entries.len(), 10);
        for entry in entries {
            assert!(entry.validated().is_ok());
        }
    }

    #[test]
    fn test_seed_if_empty_is_idempotent() {
        let store = SqliteKnowledgeStore::new(Arc::new(Database::in_memory().unwrap()));
        assert_eq!(seed_if_empty(&store).unwrap(), 10);
        assert_eq!(seed_if_empty(&store).unwrap(), 0);
        assert_eq!(store.count().unwrap(), 10);
    }

    #[test]
    fn test_seeded_store_answers_common_questions() {
        let store = SqliteKnowledgeStore::new(Arc::new(Database::in_memory().unwrap()));
        seed_if_empty(&store).unwrap();

        let hits = store.search("What is machine learning?", 3).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].title, "Machine Learning Fundamentals");

        assert!(store.search("quantum computing", 3).unwrap().is_empty());
    }
}
