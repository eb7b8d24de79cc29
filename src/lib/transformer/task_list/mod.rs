use std::{collections::VecDeque, iter::Peekable};

use pulldown_cmark::{CowStr, Event, Tag};

use crate::transformer::Transformer;

/// Marks task list items with `class="task-list-item"` and renders their
/// checkbox as a disabled input. In a loose list the marker comes after the
/// item's opening paragraph, so up to two events are looked at ahead.
pub struct TaskListTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    inner: Peekable<I>,
    pending: VecDeque<Event<'a>>,
}

impl<'a, I> Iterator for TaskListTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(ev) = self.pending.pop_front() {
            return Some(ev);
        }

        match self.inner.next()? {
            Event::Start(Tag::Item) => {
                if let Some(Event::TaskListMarker(checked)) = self.next_marker() {
                    return Some(Event::Html(CowStr::from(format!(
                        r#"<li class="task-list-item">{} "#,
                        checkbox(checked)
                    ))));
                }
                let Some(para) = self
                    .inner
                    .next_if(|ev| matches!(ev, Event::Start(Tag::Paragraph)))
                else {
                    return Some(Event::Start(Tag::Item));
                };
                self.pending.push_back(para);
                match self.next_marker() {
                    Some(Event::TaskListMarker(checked)) => {
                        self.pending
                            .push_back(Event::InlineHtml(CowStr::from(format!(
                                "{} ",
                                checkbox(checked)
                            ))));
                        Some(Event::Html(CowStr::from(r#"<li class="task-list-item">"#)))
                    }
                    _ => Some(Event::Start(Tag::Item)),
                }
            }
            // A marker not at the start of an item.
            Event::TaskListMarker(checked) => Some(Event::InlineHtml(CowStr::from(format!(
                "{} ",
                checkbox(checked)
            )))),
            other => Some(other),
        }
    }
}

impl<'a, I> TaskListTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    fn next_marker(&mut self) -> Option<Event<'a>> {
        self.inner
            .next_if(|ev| matches!(ev, Event::TaskListMarker(_)))
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked {
        r#"<input type="checkbox" checked disabled />"#
    } else {
        r#"<input type="checkbox" disabled />"#
    }
}

impl<'a, I> Transformer<'a, I> for TaskListTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    fn transform(inner: I) -> Self {
        Self {
            inner: inner.peekable(),
            pending: VecDeque::new(),
        }
    }
}
